use crate::core::device::{
    Attachment, Filter, TextureDesc, TextureFormat, TextureId, TextureKind, Wrap,
};
use crate::core::gpu::Gpu;
use crate::core::program::UniformValue;
use crate::scene::image::Image;
use image::imageops;
use log::debug;

/// An immutable-storage 2D texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Texture2D {
    pub id: TextureId,
    pub width: usize,
    pub height: usize,
    pub format: TextureFormat,
    pub filter: Filter,
    pub wrap: Wrap,
}

impl Texture2D {
    pub fn new(
        gpu: &mut Gpu,
        format: TextureFormat,
        filter: Filter,
        wrap: Wrap,
        width: usize,
        height: usize,
    ) -> Self {
        let id = gpu.device_mut().create_texture(TextureDesc {
            kind: TextureKind::Flat,
            format,
            filter,
            wrap,
            width,
            height,
        });
        Self {
            id,
            width,
            height,
            format,
            filter,
            wrap,
        }
    }

    /// Uploads `image`. The rows are flipped so texture row 0 is the bottom of
    /// the picture, and the pixels are converted to RGBA8 when needed.
    pub fn load(gpu: &mut Gpu, format: TextureFormat, filter: Filter, wrap: Wrap, image: &Image) -> Self {
        let rgba = imageops::flip_vertical(&image.data().to_rgba8());
        let (w, h) = rgba.dimensions();
        let texture = Self::new(gpu, format, filter, wrap, w as usize, h as usize);
        gpu.device_mut().upload_texture(texture.id, 0, rgba.as_raw());
        debug!("Uploaded image {:?} as texture {:?} ({}x{})", image.id(), texture.id, w, h);
        texture
    }

    pub fn set_border_color(&self, gpu: &mut Gpu, rgba: [f32; 4]) {
        gpu.device_mut().set_border_color(self.id, rgba);
    }

    pub fn attachment(&self) -> Attachment {
        Attachment::Texture(self.id)
    }
}

impl From<&Texture2D> for UniformValue {
    fn from(t: &Texture2D) -> Self {
        UniformValue::Texture2D(t.id)
    }
}

/// Six square faces ordered +X, -X, +Y, -Y, +Z, -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeMap {
    pub id: TextureId,
    pub width: usize,
    pub height: usize,
    pub format: TextureFormat,
    pub filter: Filter,
}

impl CubeMap {
    pub fn new(gpu: &mut Gpu, format: TextureFormat, filter: Filter, width: usize, height: usize) -> Self {
        let id = gpu.device_mut().create_texture(TextureDesc {
            kind: TextureKind::Cube,
            format,
            filter,
            wrap: Wrap::EdgeClamp,
            width,
            height,
        });
        Self {
            id,
            width,
            height,
            format,
            filter,
        }
    }

    /// Uploads six face images. Faces are stored with their first row at t = 0.
    pub fn load(gpu: &mut Gpu, filter: Filter, faces: [&Image; 6]) -> Result<Self, String> {
        let (w, h) = faces[0].dimensions();
        if let Some(bad) = faces.iter().position(|f| f.dimensions() != (w, h)) {
            return Err(format!(
                "cube map face {} is {:?}, expected {}x{}",
                bad,
                faces[bad].dimensions(),
                w,
                h
            ));
        }

        let cube = Self::new(gpu, TextureFormat::Rgba8, filter, w as usize, h as usize);
        for (layer, face) in faces.iter().enumerate() {
            let rgba = face.data().to_rgba8();
            gpu.device_mut().upload_texture(cube.id, layer, rgba.as_raw());
        }
        Ok(cube)
    }

    pub fn face(&self, face: usize) -> Attachment {
        Attachment::CubeFace(self.id, face)
    }
}

impl From<&CubeMap> for UniformValue {
    fn from(c: &CubeMap) -> Self {
        UniformValue::Cube(c.id)
    }
}
