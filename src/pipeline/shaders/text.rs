use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::{Vector2, Vector4};

const U_RESOLUTION: usize = 0;
const U_FONT: usize = 1;

const V_UV: usize = 0;
const V_COLOR: usize = 2;

/// Glyph quads in pixel space (origin top-left) textured from the font atlas,
/// tinted by a per-vertex colour.
pub struct TextKernel;

impl ShaderKernel for TextKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: &["position", "texcoord", "color"],
            uniforms: &[
                ("resolution", UniformKind::Vec3),
                ("font", UniformKind::Sampler2D),
            ],
            outputs: &["color"],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        let resolution = ctx.vec3(U_RESOLUTION).xy();
        let p = inputs[0].xy();
        let ndc = Vector2::new(
            p.x / resolution.x * 2.0 - 1.0,
            1.0 - p.y / resolution.y * 2.0,
        );
        let mut out = Varyings::default();
        out.set2(V_UV, inputs[1].xy());
        out.set4(V_COLOR, inputs[2]);
        (Vector4::new(ndc.x, ndc.y, 0.0, 1.0), out)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let coverage = ctx.sample(U_FONT, v.get2(V_UV)).x;
        if coverage <= 0.0 {
            return None;
        }
        let mut color = v.get4(V_COLOR);
        color.w *= coverage;
        Some(FragmentOutput::color(color))
    }
}
