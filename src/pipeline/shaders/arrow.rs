use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::Vector4;

/// Solid-colour world-space line segments.
pub struct ArrowKernel;

impl ShaderKernel for ArrowKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: &[
                ("view_projection", UniformKind::Mat4),
                ("color", UniformKind::Vec3),
            ],
            outputs: &["color"],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        (ctx.mat4(0) * inputs[0].xyz().push(1.0), Varyings::default())
    }

    fn fragment(&self, ctx: &ShaderContext, _: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        Some(FragmentOutput::color(ctx.vec3(1).push(1.0)))
    }
}
