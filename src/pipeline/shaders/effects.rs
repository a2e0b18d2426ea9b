//! Full-screen post-processing kernels.

use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use crate::pipeline::shaders::quad::{V_UV, screen_vertex};
use nalgebra::Vector4;

const U_DEPTH: usize = 0;
const U_INVERSE_PROJECTION: usize = 1;
const U_FAR: usize = 2;
const U_FOG_COLOR: usize = 3;
const U_DENSITY: usize = 4;

/// Exponential fog over view-space depth reconstructed from the depth buffer.
/// Outputs the fog colour with its coverage in alpha, for alpha-over blending.
pub struct FogKernel;

impl ShaderKernel for FogKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: &[
                ("depth", UniformKind::Sampler2D),
                ("inverse_projection", UniformKind::Mat4),
                ("far", UniformKind::Float),
                ("fog_color", UniformKind::Vec3),
                ("density", UniformKind::Float),
            ],
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
        let uv = v.get2(V_UV);
        let depth = ctx.sample(U_DEPTH, uv).x;
        let ndc = Vector4::new(uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0, depth * 2.0 - 1.0, 1.0);
        let view = ctx.mat4(U_INVERSE_PROJECTION) * ndc;
        let far = ctx.float(U_FAR).max(1e-6);
        let distance = (-view.z / view.w).clamp(0.0, far);

        let alpha = 1.0 - (-ctx.float(U_DENSITY) * distance / far).exp();
        Some(FragmentOutput::color(ctx.vec3(U_FOG_COLOR).push(alpha)))
    }
}

/// Largest blur radius the weight uniforms can hold.
pub const MAX_BLUR_RADIUS: usize = 7;

const U_IMAGE: usize = 0;
const U_STEP: usize = 1;
const U_RADIUS: usize = 2;
const U_WEIGHTS_LO: usize = 3;
const U_WEIGHTS_HI: usize = 4;

/// One direction of a separable Gaussian. `step` is the uv offset between
/// taps; weights 0..=radius are packed into two vec4s.
pub struct BlurKernel;

impl ShaderKernel for BlurKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position"],
            uniforms: &[
                ("image", UniformKind::Sampler2D),
                ("step", UniformKind::Vec3),
                ("radius", UniformKind::Int),
                ("weights_lo", UniformKind::Vec4),
                ("weights_hi", UniformKind::Vec4),
            ],
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
        let uv = v.get2(V_UV);
        let step = ctx.vec3(U_STEP).xy();
        let radius = (ctx.int(U_RADIUS).max(0) as usize).min(MAX_BLUR_RADIUS);
        let lo = ctx.vec4(U_WEIGHTS_LO);
        let hi = ctx.vec4(U_WEIGHTS_HI);
        let weight = |i: usize| if i < 4 { lo[i] } else { hi[i - 4] };

        let mut sum = ctx.sample(U_IMAGE, uv) * weight(0);
        for i in 1..=radius {
            let offset = step * i as f32;
            sum += (ctx.sample(U_IMAGE, uv + offset) + ctx.sample(U_IMAGE, uv - offset)) * weight(i);
        }
        Some(FragmentOutput::color(sum))
    }
}

/// Normalised one-sided Gaussian weights for taps 0..=radius.
pub fn gaussian_weights(radius: usize, sigma: f32) -> [f32; MAX_BLUR_RADIUS + 1] {
    let radius = radius.min(MAX_BLUR_RADIUS);
    let sigma = sigma.max(1e-3);
    let mut weights = [0.0; MAX_BLUR_RADIUS + 1];
    for (i, w) in weights.iter_mut().enumerate().take(radius + 1) {
        *w = (-((i * i) as f32) / (2.0 * sigma * sigma)).exp();
    }
    let total = weights[0] + 2.0 * weights[1..=radius].iter().sum::<f32>();
    weights.iter_mut().for_each(|w| *w /= total);
    weights
}
