use crate::core::device::{
    Attachment, BufferId, Device, DrawCommand, FramebufferId, ProgramId, TextureDesc, TextureId,
};
use crate::core::program::{AttributeBinding, ProgramDesc, UniformValue};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Shared call counters, readable while the device is owned by a `Gpu`.
#[derive(Debug, Clone, Default)]
pub struct CallCounts(Arc<Mutex<BTreeMap<&'static str, usize>>>);

impl CallCounts {
    fn bump(&self, call: &'static str) {
        if let Ok(mut map) = self.0.lock() {
            *map.entry(call).or_insert(0) += 1;
        }
    }

    pub fn get(&self, call: &str) -> usize {
        self.0
            .lock()
            .map(|m| m.get(call).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, usize> {
        self.0.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.snapshot().values().sum()
    }

    pub fn log_totals(&self) {
        for (call, count) in self.snapshot() {
            info!("gpu {:<22} {}", call, count);
        }
    }
}

/// Wraps a device and counts every call by kind.
pub struct TracingDevice<D: Device> {
    inner: D,
    name: String,
    counts: CallCounts,
}

impl<D: Device> TracingDevice<D> {
    pub fn new(inner: D) -> Self {
        let name = format!("{} (traced)", inner.name());
        Self {
            inner,
            name,
            counts: CallCounts::default(),
        }
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.clone()
    }
}

impl<D: Device> Device for TracingDevice<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_buffer(&mut self) -> BufferId {
        self.counts.bump("create_buffer");
        let id = self.inner.create_buffer();
        debug!("create_buffer -> {:?}", id);
        id
    }

    fn allocate_buffer(&mut self, buffer: BufferId, size: usize) {
        self.counts.bump("allocate_buffer");
        self.inner.allocate_buffer(buffer, size);
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        self.counts.bump("write_buffer");
        self.inner.write_buffer(buffer, offset, bytes);
    }

    fn read_buffer(&self, buffer: BufferId) -> Vec<u8> {
        self.inner.read_buffer(buffer)
    }

    fn create_texture(&mut self, desc: TextureDesc) -> TextureId {
        self.counts.bump("create_texture");
        let id = self.inner.create_texture(desc);
        debug!("create_texture {}x{} {:?} -> {:?}", desc.width, desc.height, desc.kind, id);
        id
    }

    fn set_border_color(&mut self, texture: TextureId, rgba: [f32; 4]) {
        self.counts.bump("set_border_color");
        self.inner.set_border_color(texture, rgba);
    }

    fn upload_texture(&mut self, texture: TextureId, layer: usize, rgba: &[u8]) {
        self.counts.bump("upload_texture");
        self.inner.upload_texture(texture, layer, rgba);
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.inner.texture_desc(texture)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.counts.bump("create_framebuffer");
        self.inner.create_framebuffer()
    }

    fn attach_color(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>) {
        self.counts.bump("attach_color");
        self.inner.attach_color(framebuffer, attachment);
    }

    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>) {
        self.counts.bump("attach_depth");
        self.inner.attach_depth(framebuffer, attachment);
    }

    fn framebuffer_complete(&self, framebuffer: FramebufferId) -> bool {
        self.inner.framebuffer_complete(framebuffer)
    }

    fn clear_color(&mut self, framebuffer: FramebufferId, rgba: [f32; 4]) {
        self.counts.bump("clear_color");
        self.inner.clear_color(framebuffer, rgba);
    }

    fn clear_depth(&mut self, framebuffer: FramebufferId, depth: f32) {
        self.counts.bump("clear_depth");
        self.inner.clear_depth(framebuffer, depth);
    }

    fn read_pixels(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<u8>)> {
        self.inner.read_pixels(framebuffer)
    }

    fn read_depth(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<f32>)> {
        self.inner.read_depth(framebuffer)
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, String> {
        self.counts.bump("create_program");
        self.inner.create_program(desc)
    }

    fn set_uniform(&mut self, program: ProgramId, location: usize, value: UniformValue) {
        self.counts.bump("set_uniform");
        self.inner.set_uniform(program, location, value);
    }

    fn bind_attribute(&mut self, program: ProgramId, location: usize, binding: AttributeBinding) {
        self.counts.bump("bind_attribute");
        self.inner.bind_attribute(program, location, binding);
    }

    fn bind_index_buffer(&mut self, program: ProgramId, buffer: Option<BufferId>) {
        self.counts.bump("bind_index_buffer");
        self.inner.bind_index_buffer(program, buffer);
    }

    fn draw(&mut self, command: &DrawCommand) {
        self.counts
            .bump(if command.indexed { "draw_indexed" } else { "draw_arrays" });
        self.inner.draw(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::software::SoftwareDevice;

    #[test]
    fn counts_survive_boxing() {
        let device = TracingDevice::new(SoftwareDevice::new(2, 2));
        let counts = device.counts();
        let mut boxed: Box<dyn Device> = Box::new(device);
        boxed.create_buffer();
        boxed.create_buffer();
        assert_eq!(counts.get("create_buffer"), 2);
        assert_eq!(counts.get("draw_arrays"), 0);
        assert_eq!(boxed.name(), "software (traced)");
    }
}
