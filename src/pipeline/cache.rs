use crate::core::buffer::Buffer;
use crate::core::device::{Filter, TextureFormat, Wrap};
use crate::core::gpu::Gpu;
use crate::core::texture::{CubeMap, Texture2D};
use crate::scene::Skybox;
use crate::scene::geometry::Geometry;
use crate::scene::id::{GeometryId, ImageId, LightId};
use crate::scene::image::Image;
use log::debug;
use std::collections::HashMap;

/// Vertex and index buffers of one uploaded geometry.
#[derive(Debug)]
pub struct GeometryBuffers {
    pub vertices: Buffer,
    pub indices: Buffer,
    pub index_count: usize,
}

/// GPU resources keyed by the identity of whatever produced them. Entries are
/// created on first use and never evicted.
#[derive(Debug, Default)]
pub struct ResourceCache {
    buffers: HashMap<GeometryId, GeometryBuffers>,
    textures: HashMap<ImageId, Texture2D>,
    cube_maps: HashMap<ImageId, CubeMap>,
    point_shadow_maps: HashMap<LightId, CubeMap>,
    spot_shadow_maps: HashMap<LightId, Texture2D>,
    directional_shadow_maps: HashMap<LightId, Texture2D>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers for `geometry`, uploading them on the first request.
    pub fn geometry_buffers(&mut self, gpu: &mut Gpu, geometry: &Geometry) -> &GeometryBuffers {
        self.buffers.entry(geometry.id()).or_insert_with(|| {
            let mut vertices = Buffer::new(gpu);
            vertices.set_data(gpu, geometry.verts());
            let mut indices = Buffer::new(gpu);
            indices.set_data(gpu, geometry.faces());
            debug!(
                "Uploaded geometry {:?}: {} vertices, {} indices",
                geometry.id(),
                geometry.verts().len(),
                geometry.faces().len()
            );
            GeometryBuffers {
                vertices,
                indices,
                index_count: geometry.faces().len(),
            }
        })
    }

    /// Colour texture for `image` (linear filter, repeat wrap).
    pub fn texture(&mut self, gpu: &mut Gpu, image: &Image) -> Texture2D {
        *self.textures.entry(image.id()).or_insert_with(|| {
            Texture2D::load(gpu, TextureFormat::Rgba8, Filter::Linear, Wrap::Repeat, image)
        })
    }

    pub fn skybox(&mut self, gpu: &mut Gpu, skybox: &Skybox) -> Result<CubeMap, String> {
        if let Some(cube) = self.cube_maps.get(&skybox.id()) {
            return Ok(*cube);
        }
        let faces = [
            skybox.faces[0].as_ref(),
            skybox.faces[1].as_ref(),
            skybox.faces[2].as_ref(),
            skybox.faces[3].as_ref(),
            skybox.faces[4].as_ref(),
            skybox.faces[5].as_ref(),
        ];
        let cube = CubeMap::load(gpu, Filter::Linear, faces)?;
        debug!("Uploaded skybox {:?} ({}x{})", skybox.id(), cube.width, cube.height);
        self.cube_maps.insert(skybox.id(), cube);
        Ok(cube)
    }

    /// Cube depth map of a point light, allocated on first use.
    pub fn point_shadow_map(&mut self, gpu: &mut Gpu, light: LightId, size: usize) -> CubeMap {
        *self.point_shadow_maps.entry(light).or_insert_with(|| {
            debug!("Allocated {}x{} shadow cube for light {:?}", size, size, light);
            CubeMap::new(gpu, TextureFormat::Depth16, Filter::Nearest, size, size)
        })
    }

    pub fn spot_shadow_map(&mut self, gpu: &mut Gpu, light: LightId, size: usize) -> Texture2D {
        *self
            .spot_shadow_maps
            .entry(light)
            .or_insert_with(|| shadow_texture(gpu, light, size))
    }

    pub fn directional_shadow_map(&mut self, gpu: &mut Gpu, light: LightId, size: usize) -> Texture2D {
        *self
            .directional_shadow_maps
            .entry(light)
            .or_insert_with(|| shadow_texture(gpu, light, size))
    }

    pub fn point_shadow(&self, light: LightId) -> Option<CubeMap> {
        self.point_shadow_maps.get(&light).copied()
    }

    pub fn spot_shadow(&self, light: LightId) -> Option<Texture2D> {
        self.spot_shadow_maps.get(&light).copied()
    }

    pub fn directional_shadow(&self, light: LightId) -> Option<Texture2D> {
        self.directional_shadow_maps.get(&light).copied()
    }

    pub fn geometry_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

/// Depth map that reads as fully lit outside its frustum.
fn shadow_texture(gpu: &mut Gpu, light: LightId, size: usize) -> Texture2D {
    debug!("Allocated {}x{} shadow map for light {:?}", size, size, light);
    let texture = Texture2D::new(
        gpu,
        TextureFormat::Depth16,
        Filter::Nearest,
        Wrap::BorderClamp,
        size,
        size,
    );
    texture.set_border_color(gpu, [1.0, 1.0, 1.0, 1.0]);
    texture
}
