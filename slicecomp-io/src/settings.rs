use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slicecomp_core::{AppearanceSettings, Color};
use slicecomp_renderer::RendererConfig;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Everything a slice window needs besides its data, as stored on disk.
///
/// Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub appearance: AppearanceSettings,
    pub renderer: RendererConfig,
    /// Share one zoom level between all slice windows.
    pub linked_zoom: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            appearance: AppearanceSettings::default(),
            renderer: RendererConfig::default(),
            linked_zoom: true,
        }
    }
}

fn check_color(name: &str, color: &Color) -> Result<(), SettingsError> {
    let in_range = |c: f64| (0.0..=1.0).contains(&c);
    if in_range(color.r) && in_range(color.g) && in_range(color.b) {
        Ok(())
    } else {
        Err(SettingsError::Invalid(format!("{} color {:?} is outside [0, 1]", name, color)))
    }
}

impl RendererSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let settings = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!("loaded renderer settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        info!("saved renderer settings to {}", path.display());
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), SettingsError> {
        self.validate()?;
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let depth = &self.renderer.depth;
        if !(depth.step > 0.0) {
            return Err(SettingsError::Invalid(format!("depth step must be positive, got {}", depth.step)));
        }
        if depth.overlay_start <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "overlay depths must start above the base layer, got {}",
                depth.overlay_start
            )));
        }
        if depth.segmentation_start <= depth.overlay_start {
            return Err(SettingsError::Invalid(format!(
                "segmentation depth {} is not above overlay start {}",
                depth.segmentation_start, depth.overlay_start
            )));
        }
        if self.renderer.pool_batch_size < 2 {
            return Err(SettingsError::Invalid(format!(
                "pool batch size must be at least 2, got {}",
                self.renderer.pool_batch_size
            )));
        }
        let fraction = self.renderer.thumbnails.size_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(SettingsError::Invalid(format!(
                "thumbnail size fraction must be in (0, 1], got {}",
                fraction
            )));
        }

        let a = &self.appearance;
        check_color("background", &a.background)?;
        check_color("selected thumbnail", &a.thumbnail_selected.color)?;
        check_color("hovered thumbnail", &a.thumbnail_hovered.color)?;
        check_color("selected and hovered thumbnail", &a.thumbnail_selected_hovered.color)?;
        Ok(())
    }
}
