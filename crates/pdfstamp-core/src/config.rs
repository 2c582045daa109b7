//! Placement configuration for a stamping batch
//!
//! These types mirror what the calling layer (web form, CLI) collects from
//! the user. A config is built once per batch and shared read-only across
//! every document and page.

use serde::{Deserialize, Serialize};

/// How the stamped image is sized on the page.
///
/// Exactly one mode is ever active; the two cannot be blended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeMode {
    /// Scale the image relative to its DPI-normalized intrinsic size.
    Scale { factor: f64 },
    /// Render at fixed point dimensions. A missing width or height is
    /// derived from the image's aspect ratio; if both are missing the
    /// DPI-normalized intrinsic size is used.
    Fixed {
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionPreset {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    Custom,
}

impl PositionPreset {
    /// Parse a user-facing preset name like "bottom-right".
    ///
    /// Unrecognized names fall back to `BottomRight` rather than erroring,
    /// matching the permissive behavior of the original tool.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            "center" => Self::Center,
            "custom" => Self::Custom,
            _ => Self::BottomRight,
        }
    }
}

/// Which pages of a document receive the stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSelection {
    All,
    FirstOnly,
    LastOnly,
}

impl PageSelection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "first" => Some(Self::FirstOnly),
            "last" => Some(Self::LastOnly),
            _ => None,
        }
    }

    /// Whether page `index` (0-based) of a `total`-page document is selected.
    /// A single-page document satisfies both `FirstOnly` and `LastOnly`.
    pub fn selects(&self, index: usize, total: usize) -> bool {
        match self {
            Self::All => true,
            Self::FirstOnly => index == 0,
            Self::LastOnly => total > 0 && index == total - 1,
        }
    }
}

/// Full placement configuration for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub size: SizeMode,
    pub position: PositionPreset,
    /// Horizontal margin in points; ignored for `Center` and `Custom`.
    #[serde(default)]
    pub margin_x: f64,
    /// Vertical margin in points; ignored for `Center` and `Custom`.
    #[serde(default)]
    pub margin_y: f64,
    /// Explicit origin, used only when `position` is `Custom`.
    #[serde(default = "default_custom_coord")]
    pub custom_x: f64,
    #[serde(default = "default_custom_coord")]
    pub custom_y: f64,
    pub pages: PageSelection,
}

fn default_custom_coord() -> f64 {
    50.0
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            size: SizeMode::Fixed {
                width: Some(200.0),
                height: None,
            },
            position: PositionPreset::BottomRight,
            margin_x: 20.0,
            margin_y: 20.0,
            custom_x: 50.0,
            custom_y: 50.0,
            pages: PageSelection::All,
        }
    }
}
