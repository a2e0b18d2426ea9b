//! Depth-only kernels for the shadow passes.

use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::Vector4;

const U_WORLD: usize = 0;
const U_VIEW: usize = 1;
const U_PROJECTION: usize = 2;

const V_WORLD_POS: usize = 0;

fn shadow_vertex(ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
    let world_pos = ctx.mat4(U_WORLD) * inputs[0].xyz().push(1.0);
    let clip = ctx.mat4(U_PROJECTION) * (ctx.mat4(U_VIEW) * world_pos);
    let mut out = Varyings::default();
    out.set3(V_WORLD_POS, world_pos.xyz());
    (clip, out)
}

const OMNI_UNIFORMS: &[(&str, UniformKind)] = &[
    ("world", UniformKind::Mat4),
    ("view", UniformKind::Mat4),
    ("projection", UniformKind::Mat4),
    ("light_position", UniformKind::Vec3),
    ("shadow_far", UniformKind::Float),
];
const U_LIGHT_POSITION: usize = 3;
const U_FAR: usize = 4;

/// Writes the linear distance to the light, divided by the far distance, as
/// fragment depth. Used for point-light cube faces and spot lights.
pub struct ShadowOmniKernel;

impl ShaderKernel for ShadowOmniKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: OMNI_UNIFORMS,
            outputs: &[],
            defines: &[],
            writes_depth: true,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        shadow_vertex(ctx, inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let distance = (v.get3(V_WORLD_POS) - ctx.vec3(U_LIGHT_POSITION)).norm();
        Some(FragmentOutput {
            color: Vector4::zeros(),
            depth: Some((distance / ctx.float(U_FAR)).clamp(0.0, 1.0)),
        })
    }
}

const ORTHO_UNIFORMS: &[(&str, UniformKind)] = &[
    ("world", UniformKind::Mat4),
    ("view", UniformKind::Mat4),
    ("projection", UniformKind::Mat4),
];

/// Plain window depth, for directional lights.
pub struct ShadowOrthoKernel;

impl ShaderKernel for ShadowOrthoKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: ORTHO_UNIFORMS,
            outputs: &[],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        shadow_vertex(ctx, inputs)
    }

    fn fragment(&self, _: &ShaderContext, _: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        Some(FragmentOutput::color(Vector4::zeros()))
    }
}
