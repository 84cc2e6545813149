use serde::{Deserialize, Serialize};

use crate::geometry::Color;

/// Texture sampling used when a slice is magnified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    #[default]
    Nearest,
    Linear,
}

/// Line styling for one decoration element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: Color,
    pub thickness: f64,
    pub visible: bool,
}

impl LineStyle {
    pub fn new(color: Color, thickness: f64) -> Self {
        Self {
            color,
            thickness,
            visible: true,
        }
    }
}

/// Display settings shared by every slice renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    pub background: Color,
    pub interpolation: InterpolationMode,
    /// Master switch for overlays (segmentation, annotations, zoom locator).
    pub overall_visibility: bool,
    /// Outline drawn around a selected thumbnail.
    pub thumbnail_selected: LineStyle,
    /// Outline drawn around a hovered thumbnail.
    pub thumbnail_hovered: LineStyle,
    /// Outline drawn around a thumbnail that is both selected and hovered.
    pub thumbnail_selected_hovered: LineStyle,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            interpolation: InterpolationMode::Nearest,
            overall_visibility: true,
            thumbnail_selected: LineStyle::new(Color::rgb(1.0, 0.9, 0.1), 1.5),
            thumbnail_hovered: LineStyle::new(Color::rgb(0.6, 0.54, 0.46), 1.5),
            thumbnail_selected_hovered: LineStyle::new(Color::rgb(1.0, 1.0, 0.5), 1.5),
        }
    }
}

impl AppearanceSettings {
    /// The outline style for a thumbnail, if it needs one.
    pub fn thumbnail_highlight(&self, selected: bool, hovered: bool) -> Option<&LineStyle> {
        let style = match (selected, hovered) {
            (true, true) => &self.thumbnail_selected_hovered,
            (true, false) => &self.thumbnail_selected,
            (false, true) => &self.thumbnail_hovered,
            (false, false) => return None,
        };
        style.visible.then_some(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_highlight() {
        let settings = AppearanceSettings::default();
        assert!(settings.thumbnail_highlight(false, false).is_none());
        let both = settings.thumbnail_highlight(true, true).unwrap();
        assert_eq!(both.color, Color::rgb(1.0, 1.0, 0.5));
        let hovered = settings.thumbnail_highlight(false, true).unwrap();
        assert_eq!(hovered.color, Color::rgb(0.6, 0.54, 0.46));
    }

    #[test]
    fn test_hidden_style_is_skipped() {
        let mut settings = AppearanceSettings::default();
        settings.thumbnail_selected.visible = false;
        assert!(settings.thumbnail_highlight(true, false).is_none());
    }
}
