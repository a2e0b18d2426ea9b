use crate::scene::id::ImageId;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use log::info;
use nalgebra::Vector3;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Decoded pixels with a stable identity; the texture cache keys on the id.
#[derive(Debug, Clone)]
pub struct Image {
    id: ImageId,
    data: DynamicImage,
}

impl Image {
    pub fn new(data: DynamicImage) -> Self {
        Self {
            id: ImageId::new(),
            data,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path_ref = path.as_ref();
        let img = image::open(path_ref)
            .map_err(|e| format!("Failed to load image {:?}: {}", path_ref, e))?;
        info!(
            "Loaded image: {:?} ({}x{})",
            path_ref,
            img.width(),
            img.height()
        );
        Ok(Self::new(img))
    }

    /// Wraps raw RGBA8 rows, top row first.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, String> {
        let buffer = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| format!("pixel data does not match {}x{} RGBA", width, height))?;
        Ok(Self::new(DynamicImage::ImageRgba8(buffer)))
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba(rgba),
        )))
    }

    /// 1x1 {ff, ff, ff, 00}: the neutral colour map.
    pub fn white_transparent() -> Arc<Image> {
        static WHITE: OnceLock<Arc<Image>> = OnceLock::new();
        WHITE
            .get_or_init(|| Arc::new(Image::solid(1, 1, [0xff, 0xff, 0xff, 0x00])))
            .clone()
    }

    /// 1x1 {80, 80, ff}: a normal map that leaves the surface normal unchanged.
    pub fn flat_normal() -> Arc<Image> {
        static FLAT: OnceLock<Arc<Image>> = OnceLock::new();
        FLAT.get_or_init(|| Arc::new(Image::solid(1, 1, [0x80, 0x80, 0xff, 0xff])))
            .clone()
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn data(&self) -> &DynamicImage {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.data.dimensions()
    }

    /// Converts a grayscale height map into a tangent-space normal map using
    /// central differences: n = normalize(-dh/dx, -dh/dy, 1), biased to [0, 1].
    /// The y derivative points up the picture, matching texture v.
    pub fn bump_to_normal(&self) -> Image {
        let height = self.data.to_luma8();
        let (w, h) = height.dimensions();
        let sample = |x: i64, y: i64| -> f32 {
            let x = x.clamp(0, w as i64 - 1) as u32;
            let y = y.clamp(0, h as i64 - 1) as u32;
            height.get_pixel(x, y).0[0] as f32 / 255.0
        };

        let out = RgbaImage::from_fn(w, h, |x, y| {
            let (x, y) = (x as i64, y as i64);
            let dx = (sample(x + 1, y) - sample(x - 1, y)) * 0.5;
            // Rows grow downwards in the picture.
            let dy = (sample(x, y - 1) - sample(x, y + 1)) * 0.5;
            let n = Vector3::new(-dx, -dy, 1.0).normalize();
            let q = |c: f32| ((c * 0.5 + 0.5) * 255.0).round() as u8;
            Rgba([q(n.x), q(n.y), q(n.z), 0xff])
        });
        Image::new(DynamicImage::ImageRgba8(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_keep_their_identity() {
        assert_eq!(Image::white_transparent().id(), Image::white_transparent().id());
        assert_ne!(Image::white_transparent().id(), Image::flat_normal().id());
        let px = Image::flat_normal().data().to_rgba8().get_pixel(0, 0).0;
        assert_eq!(&px[..3], &[0x80, 0x80, 0xff]);
    }

    #[test]
    fn flat_height_map_gives_flat_normals() {
        let bump = Image::solid(4, 4, [90, 90, 90, 255]).bump_to_normal();
        let rgba = bump.data().to_rgba8();
        assert!(rgba.pixels().all(|p| p.0 == [128, 128, 255, 255]));
    }

    #[test]
    fn slope_tilts_normal_against_gradient() {
        // Height increases to the right.
        let pixels: Vec<u8> = (0..3u8)
            .flat_map(|_| (0..3u8).flat_map(|x| [x * 100, x * 100, x * 100, 255]))
            .collect();
        let bump = Image::from_rgba(3, 3, pixels).unwrap().bump_to_normal();
        let center = bump.data().to_rgba8().get_pixel(1, 1).0;
        assert!(center[0] < 128);
        assert_eq!(center[1], 128);
    }
}
