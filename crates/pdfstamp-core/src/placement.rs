//! Geometric placement resolution
//!
//! Converts the user-facing parameters (size mode, position preset, margins,
//! custom coordinates) plus a page's own dimensions into the exact rectangle
//! the image is drawn at. Pure functions of their inputs; pages within one
//! document may differ in size, so this runs once per stamped page.
//!
//! Coordinates are PDF points with the origin at the bottom-left of the page.

use crate::asset::ImageAsset;
use crate::config::{PlacementConfig, PositionPreset, SizeMode};

/// The rectangle a stamp renders at, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPlacement {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

/// Resolve the render rectangle for one page.
///
/// Total over all valid inputs: no clamping is performed, so margins or
/// custom coordinates that push the image off-page simply render partially
/// or wholly outside the visible area.
pub fn resolve(
    image: &ImageAsset,
    config: &PlacementConfig,
    page_width: f64,
    page_height: f64,
) -> ResolvedPlacement {
    let (width, height) = resolve_dimensions(image, &config.size);
    let (x, y) = resolve_origin(config, width, height, page_width, page_height);
    ResolvedPlacement {
        width,
        height,
        x,
        y,
    }
}

/// Final render size in points.
///
/// Scale mode normalizes pixel dimensions through the image's declared DPI
/// before applying the factor, so a 50% scale of a 300 DPI image comes out
/// smaller on the page than 50% of the same pixels tagged 72 DPI. That is
/// the historical behavior of the tool and is kept as-is.
fn resolve_dimensions(image: &ImageAsset, size: &SizeMode) -> (f64, f64) {
    let px_w = image.width as f64;
    let px_h = image.height as f64;

    match *size {
        SizeMode::Scale { factor } => (
            px_w * factor * 72.0 / image.dpi_x,
            px_h * factor * 72.0 / image.dpi_y,
        ),
        SizeMode::Fixed { width, height } => match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w / image.aspect_ratio()),
            (None, Some(h)) => (h * image.aspect_ratio(), h),
            (None, None) => (px_w * 72.0 / image.dpi_x, px_h * 72.0 / image.dpi_y),
        },
    }
}

/// Bottom-left origin of the render rectangle for each preset.
///
/// Margins apply only to the corner presets; `Center` and `Custom` ignore
/// them.
fn resolve_origin(
    config: &PlacementConfig,
    width: f64,
    height: f64,
    page_width: f64,
    page_height: f64,
) -> (f64, f64) {
    let mx = config.margin_x;
    let my = config.margin_y;

    match config.position {
        PositionPreset::TopLeft => (mx, page_height - height - my),
        PositionPreset::TopRight => (page_width - width - mx, page_height - height - my),
        PositionPreset::BottomLeft => (mx, my),
        PositionPreset::BottomRight => (page_width - width - mx, my),
        PositionPreset::Center => ((page_width - width) / 2.0, (page_height - height) / 2.0),
        PositionPreset::Custom => (config.custom_x, config.custom_y),
    }
}
