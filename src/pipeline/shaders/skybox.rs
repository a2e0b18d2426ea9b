use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::Vector4;

const U_VIEW: usize = 0;
const U_PROJECTION: usize = 1;
const U_SKYBOX: usize = 2;

/// Samples the environment cube along the direction of each cube corner.
/// The view matrix must have its translation removed.
pub struct SkyboxKernel;

impl ShaderKernel for SkyboxKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: &[
                ("view", UniformKind::Mat4),
                ("projection", UniformKind::Mat4),
                ("skybox", UniformKind::SamplerCube),
            ],
            outputs: &["color"],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        let dir = inputs[0].xyz();
        let clip = ctx.mat4(U_PROJECTION) * (ctx.mat4(U_VIEW) * dir.push(1.0));
        let mut out = Varyings::default();
        out.set3(0, dir);
        (clip, out)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let mut color = ctx.sample_cube(U_SKYBOX, v.get3(0));
        color.w = 1.0;
        Some(FragmentOutput::color(color))
    }
}
