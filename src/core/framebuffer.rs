use crate::core::device::{Attachment, FramebufferId};
use crate::core::gpu::Gpu;
use image::{ImageBuffer, Luma, RgbaImage, imageops};

/// A render target with one colour and one depth attachment slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framebuffer {
    pub id: FramebufferId,
    color: Option<Attachment>,
    depth: Option<Attachment>,
}

impl Framebuffer {
    pub fn new(gpu: &mut Gpu) -> Self {
        Self {
            id: gpu.device_mut().create_framebuffer(),
            color: None,
            depth: None,
        }
    }

    /// The window-backed framebuffer. Its attachments are owned by the device.
    pub const fn default_framebuffer() -> Self {
        Self {
            id: FramebufferId::DEFAULT,
            color: None,
            depth: None,
        }
    }

    pub fn attach_color(&mut self, gpu: &mut Gpu, attachment: Attachment) {
        self.color = Some(attachment);
        gpu.device_mut().attach_color(self.id, Some(attachment));
    }

    pub fn attach_depth(&mut self, gpu: &mut Gpu, attachment: Attachment) {
        self.depth = Some(attachment);
        gpu.device_mut().attach_depth(self.id, Some(attachment));
    }

    pub fn detach_color(&mut self, gpu: &mut Gpu) {
        self.color = None;
        gpu.device_mut().attach_color(self.id, None);
    }

    pub fn color_attachment(&self) -> Option<Attachment> {
        self.color
    }

    pub fn depth_attachment(&self) -> Option<Attachment> {
        self.depth
    }

    pub fn clear_color(&self, gpu: &mut Gpu, rgba: [f32; 4]) {
        gpu.device_mut().clear_color(self.id, rgba);
    }

    pub fn clear_depth(&self, gpu: &mut Gpu, depth: f32) {
        gpu.device_mut().clear_depth(self.id, depth);
    }

    pub fn complete(&self, gpu: &Gpu) -> bool {
        gpu.device().framebuffer_complete(self.id)
    }

    /// Reads the colour attachment as an image with the usual top-left origin.
    pub fn read_image(&self, gpu: &Gpu) -> Option<RgbaImage> {
        let (w, h, pixels) = gpu.device().read_pixels(self.id)?;
        let image = RgbaImage::from_raw(w as u32, h as u32, pixels)?;
        Some(imageops::flip_vertical(&image))
    }

    /// Reads the depth attachment as a grayscale image, top-left origin.
    pub fn read_depth_image(&self, gpu: &Gpu) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
        let (w, h, depth) = gpu.device().read_depth(self.id)?;
        let image = ImageBuffer::from_raw(w as u32, h as u32, depth)?;
        Some(imageops::flip_vertical(&image))
    }
}
