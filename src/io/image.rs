use image::{Rgba, RgbaImage};
use log::info;
use std::path::Path;

/// Saves a frame as PNG (or whatever the extension names).
pub fn save_image<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<(), String> {
    let path = path.as_ref();
    image
        .save(path)
        .map_err(|e| format!("Failed to save image to '{}': {}", path.display(), e))?;
    info!("Saved {}x{} frame to '{}'", image.width(), image.height(), path.display());
    Ok(())
}

/// Packs pixels as 0RGB words, the layout window back ends present.
pub fn to_argb(image: &RgbaImage) -> Vec<u32> {
    image
        .pixels()
        .map(|Rgba([r, g, b, _])| (u32::from(*r) << 16) | (u32::from(*g) << 8) | u32::from(*b))
        .collect()
}

/// Inverse of [`to_argb`]; alpha is opaque.
pub fn from_argb(width: usize, height: usize, pixels: &[u32]) -> Option<RgbaImage> {
    if pixels.len() != width * height {
        return None;
    }
    let raw = pixels
        .iter()
        .flat_map(|p| [(p >> 16) as u8, (p >> 8) as u8, *p as u8, 0xff])
        .collect();
    RgbaImage::from_raw(width as u32, height as u32, raw)
}
