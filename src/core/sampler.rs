//! Texel storage and filtered lookups for the software device.

use crate::core::device::{Filter, TextureDesc, TextureFormat, TextureId, Wrap};
use crate::core::program::TextureSampler;
use nalgebra::{Vector2, Vector3, Vector4};

/// One layer of texels. Colour is quantised to RGBA8; depth keeps full precision.
#[derive(Debug, Clone, PartialEq)]
pub enum Texels {
    Color(Vec<[u8; 4]>),
    Depth(Vec<f32>),
}

impl Texels {
    pub fn blank(format: TextureFormat, len: usize) -> Self {
        match format {
            TextureFormat::Rgba8 => Texels::Color(vec![[0; 4]; len]),
            TextureFormat::Depth16 => Texels::Depth(vec![1.0; len]),
        }
    }

    pub fn empty_like(&self) -> Self {
        match self {
            Texels::Color(_) => Texels::Color(Vec::new()),
            Texels::Depth(_) => Texels::Depth(Vec::new()),
        }
    }

    #[inline]
    fn fetch(&self, index: usize) -> Vector4<f32> {
        match self {
            Texels::Color(c) => c.get(index).map_or_else(Vector4::zeros, |t| unpack(*t)),
            Texels::Depth(d) => d
                .get(index)
                .map_or_else(Vector4::zeros, |&v| Vector4::new(v, v, v, 1.0)),
        }
    }
}

#[inline]
pub fn unpack(texel: [u8; 4]) -> Vector4<f32> {
    Vector4::new(
        texel[0] as f32 / 255.0,
        texel[1] as f32 / 255.0,
        texel[2] as f32 / 255.0,
        texel[3] as f32 / 255.0,
    )
}

#[inline]
pub fn pack(color: Vector4<f32>) -> [u8; 4] {
    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(color.x), q(color.y), q(color.z), q(color.w)]
}

#[derive(Debug, Clone)]
pub struct TextureStore {
    pub desc: TextureDesc,
    pub border: [f32; 4],
    pub layers: Vec<Texels>,
}

impl TextureStore {
    pub fn new(desc: TextureDesc) -> Self {
        let len = desc.width * desc.height;
        Self {
            desc,
            border: [0.0; 4],
            layers: (0..desc.kind.layers())
                .map(|_| Texels::blank(desc.format, len))
                .collect(),
        }
    }

    #[inline]
    fn texel(&self, layer: usize, x: i64, y: i64, wrap: Wrap) -> Vector4<f32> {
        let (w, h) = (self.desc.width, self.desc.height);
        match (wrap_index(x, w, wrap), wrap_index(y, h, wrap)) {
            (Some(x), Some(y)) => self.layers[layer].fetch(y * w + x),
            _ => Vector4::from(self.border),
        }
    }

    /// Filtered lookup with `uv` in [0, 1]; v = 0 is texture row 0.
    pub fn sample_layer(&self, layer: usize, uv: Vector2<f32>, wrap: Wrap) -> Vector4<f32> {
        if layer >= self.layers.len() || self.desc.width == 0 || self.desc.height == 0 {
            return Vector4::zeros();
        }
        let x = uv.x * self.desc.width as f32;
        let y = uv.y * self.desc.height as f32;

        match self.desc.filter {
            Filter::Nearest => self.texel(layer, x.floor() as i64, y.floor() as i64, wrap),
            Filter::Linear => {
                let x = x - 0.5;
                let y = y - 0.5;
                let x0 = x.floor();
                let y0 = y.floor();
                let fx = x - x0;
                let fy = y - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);

                let c00 = self.texel(layer, x0, y0, wrap);
                let c10 = self.texel(layer, x0 + 1, y0, wrap);
                let c01 = self.texel(layer, x0, y0 + 1, wrap);
                let c11 = self.texel(layer, x0 + 1, y0 + 1, wrap);

                let bottom = c00 * (1.0 - fx) + c10 * fx;
                let top = c01 * (1.0 - fx) + c11 * fx;
                bottom * (1.0 - fy) + top * fy
            }
        }
    }
}

#[inline]
fn wrap_index(i: i64, n: usize, wrap: Wrap) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let n = n as i64;
    match wrap {
        Wrap::Repeat => Some(i.rem_euclid(n) as usize),
        Wrap::EdgeClamp => Some(i.clamp(0, n - 1) as usize),
        Wrap::BorderClamp => (0..n).contains(&i).then_some(i as usize),
    }
}

/// Cube face and face coordinates for a direction, by major axis.
/// Returns (face, s, t) with s, t in [0, 1].
pub fn cube_face_coords(dir: &Vector3<f32>) -> (usize, f32, f32) {
    let (ax, ay, az) = (dir.x.abs(), dir.y.abs(), dir.z.abs());

    let (face, sc, tc, ma) = if ax >= ay && ax >= az {
        if dir.x >= 0.0 {
            (0, -dir.z, -dir.y, ax)
        } else {
            (1, dir.z, -dir.y, ax)
        }
    } else if ay >= az {
        if dir.y >= 0.0 {
            (2, dir.x, dir.z, ay)
        } else {
            (3, dir.x, -dir.z, ay)
        }
    } else if dir.z >= 0.0 {
        (4, dir.x, -dir.y, az)
    } else {
        (5, -dir.x, -dir.y, az)
    };

    if ma <= 0.0 {
        return (0, 0.5, 0.5);
    }
    (face, (sc / ma + 1.0) * 0.5, (tc / ma + 1.0) * 0.5)
}

/// All textures of a device, indexed by `TextureId - 1`.
#[derive(Debug, Default)]
pub struct TextureArena {
    pub stores: Vec<TextureStore>,
}

impl TextureArena {
    pub fn insert(&mut self, store: TextureStore) -> TextureId {
        self.stores.push(store);
        TextureId(self.stores.len() as u32)
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureStore> {
        (id.0 as usize).checked_sub(1).and_then(|i| self.stores.get(i))
    }

    pub fn get_mut(&mut self, id: TextureId) -> Option<&mut TextureStore> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.stores.get_mut(i))
    }
}

impl TextureSampler for TextureArena {
    fn sample_2d(&self, texture: TextureId, uv: Vector2<f32>) -> Vector4<f32> {
        self.get(texture)
            .map_or_else(Vector4::zeros, |t| t.sample_layer(0, uv, t.desc.wrap))
    }

    fn sample_cube(&self, texture: TextureId, dir: Vector3<f32>) -> Vector4<f32> {
        let (face, s, t) = cube_face_coords(&dir);
        self.get(texture).map_or_else(Vector4::zeros, |tex| {
            tex.sample_layer(face, Vector2::new(s, t), Wrap::EdgeClamp)
        })
    }
}
