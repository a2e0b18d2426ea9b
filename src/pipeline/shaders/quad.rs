use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::Vector4;

pub(crate) const V_UV: usize = 0;

/// Full-screen vertex stage: `position` is already in NDC, uv spans [0, 1].
pub(crate) fn screen_vertex(inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
    let p = inputs[0];
    let mut out = Varyings::default();
    out.set2(V_UV, p.xy() * 0.5 + nalgebra::Vector2::repeat(0.5));
    (Vector4::new(p.x, p.y, 0.0, 1.0), out)
}

/// Copies a 2D texture to the bound framebuffer.
pub struct QuadKernel;

impl ShaderKernel for QuadKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: &[("image", UniformKind::Sampler2D)],
            outputs: &["color"],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, _: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        screen_vertex(inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        Some(FragmentOutput::color(ctx.sample(0, v.get2(V_UV))))
    }
}
