//! # Slicecomp I/O
//!
//! Reading and writing renderer settings as human-readable JSON.

pub mod settings;

pub use settings::{RendererSettings, SettingsError};
