//! Image decoding for texture uploads.

use crate::{AssetError, Result};
use std::path::Path;

/// Decoded image: dimensions plus tightly packed RGBA8 pixels.
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decode an image file to RGBA8.
///
/// Any format the `image` crate understands is accepted; everything is
/// converted to 8-bit RGBA for upload.
pub fn load_rgba8(path: impl AsRef<Path>) -> Result<RgbaImage> {
    let path = path.as_ref();

    let decoded = image::open(path).map_err(|e| AssetError::ImageDecode {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    tracing::debug!("Loaded {}: {}x{}", path.display(), width, height);

    Ok(RgbaImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
