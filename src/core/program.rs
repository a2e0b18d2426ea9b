use crate::core::buffer::Buffer;
use crate::core::device::{BufferId, ProgramId, TextureId};
use crate::core::gpu::Gpu;
use log::debug;
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::collections::{BTreeSet, HashMap};
use std::ops::{Add, Mul};
use std::sync::Arc;

//=================================
// Kernel interface
//=================================

/// Number of scalar varying slots shared by every kernel.
pub const MAX_VARYINGS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
    Sampler2D,
    SamplerCube,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(Matrix4<f32>),
    Texture2D(TextureId),
    Cube(TextureId),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Texture2D(_) => UniformKind::Sampler2D,
            UniformValue::Cube(_) => UniformKind::SamplerCube,
        }
    }

    pub fn texture(&self) -> Option<TextureId> {
        match self {
            UniformValue::Texture2D(id) | UniformValue::Cube(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Matrix4<f32>> for UniformValue {
    fn from(v: Matrix4<f32>) -> Self {
        UniformValue::Mat4(v)
    }
}

/// The declared interface of a kernel. Locations are positions in these lists.
#[derive(Debug, Clone, Copy)]
pub struct ShaderInterface {
    pub inputs: &'static [&'static str],
    pub uniforms: &'static [(&'static str, UniformKind)],
    pub outputs: &'static [&'static str],
    /// Preprocessor flags the kernel understands.
    pub defines: &'static [&'static str],
    /// The fragment stage replaces the interpolated depth.
    pub writes_depth: bool,
    pub geometry_stage: bool,
}

/// Interpolated per-vertex data. Slots are assigned by each kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings(pub [f32; MAX_VARYINGS]);

impl Default for Varyings {
    fn default() -> Self {
        Varyings([0.0; MAX_VARYINGS])
    }
}

impl Add for Varyings {
    type Output = Varyings;

    #[inline]
    fn add(mut self, rhs: Varyings) -> Varyings {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
        self
    }
}

impl Mul<f32> for Varyings {
    type Output = Varyings;

    #[inline]
    fn mul(mut self, rhs: f32) -> Varyings {
        for a in self.0.iter_mut() {
            *a *= rhs;
        }
        self
    }
}

impl Varyings {
    #[inline]
    pub fn set2(&mut self, slot: usize, v: Vector2<f32>) {
        self.0[slot] = v.x;
        self.0[slot + 1] = v.y;
    }

    #[inline]
    pub fn set3(&mut self, slot: usize, v: Vector3<f32>) {
        self.0[slot..slot + 3].copy_from_slice(v.as_slice());
    }

    #[inline]
    pub fn set4(&mut self, slot: usize, v: Vector4<f32>) {
        self.0[slot..slot + 4].copy_from_slice(v.as_slice());
    }

    #[inline]
    pub fn get2(&self, slot: usize) -> Vector2<f32> {
        Vector2::new(self.0[slot], self.0[slot + 1])
    }

    #[inline]
    pub fn get3(&self, slot: usize) -> Vector3<f32> {
        Vector3::new(self.0[slot], self.0[slot + 1], self.0[slot + 2])
    }

    #[inline]
    pub fn get4(&self, slot: usize) -> Vector4<f32> {
        Vector4::new(
            self.0[slot],
            self.0[slot + 1],
            self.0[slot + 2],
            self.0[slot + 3],
        )
    }
}

/// Window-space position of a fragment. Origin is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragCoord {
    pub x: f32,
    pub y: f32,
    /// Interpolated depth in [0, 1].
    pub z: f32,
    pub front_facing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentOutput {
    pub color: Vector4<f32>,
    pub depth: Option<f32>,
}

impl FragmentOutput {
    pub fn color(color: Vector4<f32>) -> Self {
        Self { color, depth: None }
    }
}

/// Texture lookups available to kernels.
pub trait TextureSampler: Sync {
    fn sample_2d(&self, texture: TextureId, uv: Vector2<f32>) -> Vector4<f32>;
    fn sample_cube(&self, texture: TextureId, dir: Vector3<f32>) -> Vector4<f32>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defines(BTreeSet<String>);

impl Defines {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Defines(flags.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Uniform, define and texture state visible to a kernel during one draw.
pub struct ShaderContext<'a> {
    uniforms: &'a [Option<UniformValue>],
    textures: &'a dyn TextureSampler,
    defines: &'a Defines,
}

impl<'a> ShaderContext<'a> {
    pub fn new(
        uniforms: &'a [Option<UniformValue>],
        textures: &'a dyn TextureSampler,
        defines: &'a Defines,
    ) -> Self {
        Self {
            uniforms,
            textures,
            defines,
        }
    }

    #[inline]
    fn value(&self, location: usize) -> Option<&UniformValue> {
        self.uniforms.get(location).and_then(Option::as_ref)
    }

    pub fn defined(&self, flag: &str) -> bool {
        self.defines.contains(flag)
    }

    pub fn int(&self, location: usize) -> i32 {
        match self.value(location) {
            Some(UniformValue::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn float(&self, location: usize) -> f32 {
        match self.value(location) {
            Some(UniformValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn vec3(&self, location: usize) -> Vector3<f32> {
        match self.value(location) {
            Some(UniformValue::Vec3(v)) => *v,
            _ => Vector3::zeros(),
        }
    }

    pub fn vec4(&self, location: usize) -> Vector4<f32> {
        match self.value(location) {
            Some(UniformValue::Vec4(v)) => *v,
            _ => Vector4::zeros(),
        }
    }

    pub fn mat4(&self, location: usize) -> Matrix4<f32> {
        match self.value(location) {
            Some(UniformValue::Mat4(m)) => *m,
            _ => Matrix4::zeros(),
        }
    }

    /// Samples a 2D texture; unbound samplers read opaque black.
    pub fn sample(&self, location: usize, uv: Vector2<f32>) -> Vector4<f32> {
        match self.value(location) {
            Some(UniformValue::Texture2D(id)) => self.textures.sample_2d(*id, uv),
            _ => Vector4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn sample_cube(&self, location: usize, dir: Vector3<f32>) -> Vector4<f32> {
        match self.value(location) {
            Some(UniformValue::Cube(id)) => self.textures.sample_cube(*id, dir),
            _ => Vector4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

/// A native shader: vertex and fragment stages written in Rust against a
/// declared interface of named inputs, uniforms and outputs.
pub trait ShaderKernel: Send + Sync {
    fn interface(&self) -> ShaderInterface;

    /// Returns the clip-space position and the varyings of one vertex.
    /// `inputs` is indexed by input location; unbound inputs read (0, 0, 0, 1).
    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings);

    /// `None` discards the fragment.
    fn fragment(
        &self,
        ctx: &ShaderContext,
        varyings: &Varyings,
        frag: &FragCoord,
    ) -> Option<FragmentOutput>;
}

#[derive(Clone)]
pub struct ProgramDesc {
    pub name: String,
    pub kernel: Arc<dyn ShaderKernel>,
    pub defines: Defines,
    pub geometry_stage: bool,
}

impl ProgramDesc {
    pub fn new(name: impl Into<String>, kernel: Arc<dyn ShaderKernel>) -> Self {
        Self {
            name: name.into(),
            kernel,
            defines: Defines::default(),
            geometry_stage: false,
        }
    }

    pub fn with_defines<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defines = Defines::new(flags);
        self
    }

    pub fn with_geometry_stage(mut self) -> Self {
        self.geometry_stage = true;
        self
    }
}

/// How one vertex input reads floats from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub buffer: BufferId,
    pub components: usize,
    pub stride: usize,
    pub offset: usize,
}

//=================================
// Program handles
//=================================

/// Resolved vertex input. `Input(None)` ignores bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input(pub Option<usize>);

/// Resolved uniform. `Uniform(None)` ignores every set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uniform(pub Option<usize>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output(pub Option<usize>);

/// A linked program with its names resolved once at link time.
pub struct Program {
    id: ProgramId,
    name: String,
    interface: ShaderInterface,
    has_indices: bool,
    texture_units: HashMap<usize, u32>,
    next_unit: u32,
}

impl Program {
    pub fn new(gpu: &mut Gpu, desc: ProgramDesc) -> Result<Self, String> {
        let id = gpu.device_mut().create_program(&desc)?;
        let interface = desc.kernel.interface();
        debug!(
            "Linked program '{}' ({} inputs, {} uniforms, defines: [{}])",
            desc.name,
            interface.inputs.len(),
            interface.uniforms.len(),
            desc.defines.iter().collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            id,
            name: desc.name,
            interface,
            has_indices: false,
            texture_units: HashMap::new(),
            next_unit: 0,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self, name: &str) -> Input {
        Input(self.interface.inputs.iter().position(|n| *n == name))
    }

    pub fn uniform(&self, name: &str) -> Uniform {
        Uniform(self.interface.uniforms.iter().position(|(n, _)| *n == name))
    }

    pub fn output_color(&self, name: &str) -> Output {
        Output(self.interface.outputs.iter().position(|n| *n == name))
    }

    pub fn output_depth(&self) -> Output {
        Output(self.interface.writes_depth.then_some(0))
    }

    pub fn set_uniform(&mut self, gpu: &mut Gpu, uniform: Uniform, value: impl Into<UniformValue>) {
        let Some(location) = uniform.0 else {
            return;
        };
        let value = value.into();
        let expected = self.interface.uniforms[location].1;
        if value.kind() != expected {
            debug_assert!(
                false,
                "uniform '{}' of '{}' expects {:?}, got {:?}",
                self.interface.uniforms[location].0,
                self.name,
                expected,
                value.kind()
            );
            return;
        }

        if value.texture().is_some() && !self.texture_units.contains_key(&location) {
            self.texture_units.insert(location, self.next_unit);
            self.next_unit += 1;
        }
        gpu.device_mut().set_uniform(self.id, location, value);
    }

    /// Texture unit assigned to a sampler uniform, if it was ever set.
    pub fn texture_unit(&self, uniform: Uniform) -> Option<u32> {
        uniform.0.and_then(|l| self.texture_units.get(&l).copied())
    }

    pub fn bind_input(
        &self,
        gpu: &mut Gpu,
        input: Input,
        buffer: &Buffer,
        components: usize,
        stride: usize,
        offset: usize,
    ) {
        if let Some(location) = input.0 {
            gpu.device_mut().bind_attribute(
                self.id,
                location,
                AttributeBinding {
                    buffer: buffer.id(),
                    components,
                    stride,
                    offset,
                },
            );
        }
    }

    pub fn bind_indices(&mut self, gpu: &mut Gpu, buffer: Option<&Buffer>) {
        self.has_indices = buffer.is_some();
        gpu.device_mut()
            .bind_index_buffer(self.id, buffer.map(Buffer::id));
    }

    pub fn has_index_buffer(&self) -> bool {
        self.has_indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varyings_interpolate_linearly() {
        let mut a = Varyings::default();
        let mut b = Varyings::default();
        a.set3(0, Vector3::new(1.0, 2.0, 3.0));
        b.set3(0, Vector3::new(3.0, 4.0, 5.0));
        let mid = a * 0.5 + b * 0.5;
        assert_eq!(mid.get3(0), Vector3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn defines_are_deduplicated() {
        let d = Defines::new(["SHADOWS", "SHADOWS"]);
        assert!(d.contains("SHADOWS"));
        assert_eq!(d.iter().count(), 1);
    }
}
