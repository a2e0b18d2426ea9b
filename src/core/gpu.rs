use crate::core::device::Device;
use crate::core::software::SoftwareDevice;
use crate::core::stats::RenderStatistics;
use log::info;

/// The explicit GPU context threaded through every renderer: the device plus
/// the frame statistics it accumulates.
pub struct Gpu {
    device: Box<dyn Device>,
    pub stats: RenderStatistics,
}

impl Gpu {
    pub fn new(device: impl Device + 'static) -> Self {
        info!("GPU context on device '{}'", device.name());
        Self {
            device: Box::new(device),
            stats: RenderStatistics::default(),
        }
    }

    /// A software device whose default framebuffer is `width` x `height`.
    pub fn software(width: usize, height: usize) -> Self {
        Self::new(SoftwareDevice::new(width, height))
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }
}
