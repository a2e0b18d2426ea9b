//! Forward-shading kernels for meshes: one ambient kernel that also lays
//! down depth, and one additive kernel per light kind.
//!
//! All four share the vertex stage and the first fourteen uniform slots
//! (transforms and material), so one binding routine drives every variant.
//! Lighting runs in view space; shadow lookups use world space.

use crate::core::program::{
    FragCoord, FragmentOutput, ShaderContext, ShaderInterface, ShaderKernel, UniformKind, Varyings,
};
use nalgebra::{Vector3, Vector4};

pub const SHADOWS: &str = "SHADOWS";

pub const INPUTS: &[&str] = &["position", "texcoord", "normal", "tangent"];

const I_POSITION: usize = 0;
const I_TEXCOORD: usize = 1;
const I_NORMAL: usize = 2;
const I_TANGENT: usize = 3;

macro_rules! mesh_uniforms {
    ($($name:literal => $kind:ident),* $(,)?) => {
        &[
            ("world", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
            ("projection", UniformKind::Mat4),
            ("normal_matrix", UniformKind::Mat4),
            ("Ka", UniformKind::Vec3),
            ("Kd", UniformKind::Vec3),
            ("Ks", UniformKind::Vec3),
            ("Ns", UniformKind::Float),
            ("d", UniformKind::Float),
            ("map_Ka", UniformKind::Sampler2D),
            ("map_Kd", UniformKind::Sampler2D),
            ("map_Ks", UniformKind::Sampler2D),
            ("map_d", UniformKind::Sampler2D),
            ("map_bump", UniformKind::Sampler2D),
            $(($name, UniformKind::$kind),)*
        ]
    };
}

const U_WORLD: usize = 0;
const U_VIEW: usize = 1;
const U_PROJECTION: usize = 2;
const U_NORMAL_MATRIX: usize = 3;
const U_KA: usize = 4;
const U_KD: usize = 5;
const U_KS: usize = 6;
const U_NS: usize = 7;
const U_OPACITY: usize = 8;
const U_MAP_KA: usize = 9;
const U_MAP_KD: usize = 10;
const U_MAP_KS: usize = 11;
const U_MAP_D: usize = 12;
const U_MAP_BUMP: usize = 13;

const V_VIEW_POS: usize = 0;
const V_NORMAL: usize = 3;
const V_TANGENT: usize = 6;
const V_BITANGENT: usize = 9;
const V_UV: usize = 12;
const V_WORLD_POS: usize = 14;

/// Fragments with less coverage are discarded (alpha cutout).
const ALPHA_CUTOUT: f32 = 0.01;

/// clip = projection * (view * (world * p)). Every mesh kernel goes through
/// here so the light passes reproduce the ambient pass depth bit for bit.
fn mesh_vertex(ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
    let world = ctx.mat4(U_WORLD);
    let view = ctx.mat4(U_VIEW);
    let normal_matrix = ctx.mat4(U_NORMAL_MATRIX);

    let p = inputs[I_POSITION].xyz().push(1.0);
    let world_pos = world * p;
    let view_pos = view * world_pos;
    let clip = ctx.mat4(U_PROJECTION) * view_pos;

    let n = (normal_matrix * inputs[I_NORMAL].xyz().push(0.0)).xyz();
    let t = (view * (world * inputs[I_TANGENT].xyz().push(0.0))).xyz();

    let mut out = Varyings::default();
    out.set3(V_VIEW_POS, view_pos.xyz());
    out.set3(V_NORMAL, n);
    out.set3(V_TANGENT, t);
    out.set3(V_BITANGENT, n.cross(&t));
    out.set2(V_UV, inputs[I_TEXCOORD].xy());
    out.set3(V_WORLD_POS, world_pos.xyz());
    (clip, out)
}

/// Per-fragment material inputs after texturing and normal mapping.
struct Surface {
    view_pos: Vector3<f32>,
    world_pos: Vector3<f32>,
    normal: Vector3<f32>,
    diffuse: Vector3<f32>,
    specular: Vector3<f32>,
}

fn surface(ctx: &ShaderContext, v: &Varyings) -> Option<Surface> {
    let uv = v.get2(V_UV);
    let alpha = ctx.float(U_OPACITY) * ctx.sample(U_MAP_D, uv).x;
    if alpha < ALPHA_CUTOUT {
        return None;
    }

    let n = v.get3(V_NORMAL).normalize();
    let t = v.get3(V_TANGENT);
    let b = v.get3(V_BITANGENT);
    let bump = ctx.sample(U_MAP_BUMP, uv).xyz() * 2.0 - Vector3::repeat(1.0);
    let mapped = t * bump.x + b * bump.y + n * bump.z;
    let normal = if mapped.norm_squared() > 1e-12 {
        mapped.normalize()
    } else {
        n
    };

    Some(Surface {
        view_pos: v.get3(V_VIEW_POS),
        world_pos: v.get3(V_WORLD_POS),
        normal,
        diffuse: ctx.vec3(U_KD).component_mul(&ctx.sample(U_MAP_KD, uv).xyz()),
        specular: ctx.vec3(U_KS).component_mul(&ctx.sample(U_MAP_KS, uv).xyz()),
    })
}

/// Blinn-Phong response to a unit vector `l` pointing at the light.
fn blinn_phong(
    ctx: &ShaderContext,
    s: &Surface,
    l: &Vector3<f32>,
    diffuse: &Vector3<f32>,
    specular: &Vector3<f32>,
) -> Vector3<f32> {
    let n_dot_l = s.normal.dot(l);
    if n_dot_l <= 0.0 {
        return Vector3::zeros();
    }
    let v = (-s.view_pos).normalize();
    let h = (l + v).normalize();
    let spec = s.normal.dot(&h).max(0.0).powf(ctx.float(U_NS).max(1.0));
    diffuse.component_mul(&s.diffuse) * n_dot_l + specular.component_mul(&s.specular) * spec
}

/// Light contributions leave the alpha written by the ambient pass alone.
#[inline]
fn additive(rgb: Vector3<f32>) -> Option<FragmentOutput> {
    Some(FragmentOutput::color(rgb.push(0.0)))
}

#[inline]
fn lit(current: f32, stored: f32, bias: f32) -> f32 {
    if current - bias <= stored { 1.0 } else { 0.0 }
}

//=================================
// Ambient
//=================================

const AMBIENT_UNIFORMS: &[(&str, UniformKind)] = mesh_uniforms!("ambient_light" => Vec3);
const U_AMBIENT_LIGHT: usize = 14;

/// Ambient term plus depth. Runs first with depth test `Less`.
pub struct MeshAmbientKernel;

impl ShaderKernel for MeshAmbientKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: INPUTS,
            uniforms: AMBIENT_UNIFORMS,
            outputs: &["color"],
            defines: &[],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        mesh_vertex(ctx, inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let uv = v.get2(V_UV);
        let alpha = ctx.float(U_OPACITY) * ctx.sample(U_MAP_D, uv).x;
        if alpha < ALPHA_CUTOUT {
            return None;
        }
        let ka = ctx.vec3(U_KA).component_mul(&ctx.sample(U_MAP_KA, uv).xyz());
        let rgb = ctx.vec3(U_AMBIENT_LIGHT).component_mul(&ka);
        Some(FragmentOutput::color(rgb.push(alpha.min(1.0))))
    }
}

//=================================
// Point light
//=================================

const POINT_UNIFORMS: &[(&str, UniformKind)] = mesh_uniforms!(
    "light_position" => Vec3,
    "light_diffuse" => Vec3,
    "light_specular" => Vec3,
    "attenuation" => Float,
    "shadow_far" => Float,
    "shadow_map" => SamplerCube,
    "shadow_bias" => Float,
);
const U_POINT_POSITION: usize = 14;
const U_POINT_DIFFUSE: usize = 15;
const U_POINT_SPECULAR: usize = 16;
const U_POINT_ATTENUATION: usize = 17;
const U_POINT_FAR: usize = 18;
const U_POINT_SHADOW_MAP: usize = 19;
const U_POINT_BIAS: usize = 20;

/// Omnidirectional light; with `SHADOWS` the cube map holds distance / far.
pub struct MeshPointLightKernel;

impl ShaderKernel for MeshPointLightKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: INPUTS,
            uniforms: POINT_UNIFORMS,
            outputs: &["color"],
            defines: &[SHADOWS],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        mesh_vertex(ctx, inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let s = surface(ctx, v)?;
        let light_world = ctx.vec3(U_POINT_POSITION);
        let light_view = (ctx.mat4(U_VIEW) * light_world.push(1.0)).xyz();

        let to_light = light_view - s.view_pos;
        let distance = to_light.norm();
        let l = to_light / distance.max(1e-6);
        let falloff = 1.0 / (1.0 + ctx.float(U_POINT_ATTENUATION) * distance * distance);

        let mut shadow = 1.0;
        if ctx.defined(SHADOWS) {
            let ray = s.world_pos - light_world;
            let stored = ctx.sample_cube(U_POINT_SHADOW_MAP, ray).x;
            let current = ray.norm() / ctx.float(U_POINT_FAR);
            shadow = lit(current, stored, ctx.float(U_POINT_BIAS));
        }

        let rgb = blinn_phong(
            ctx,
            &s,
            &l,
            &ctx.vec3(U_POINT_DIFFUSE),
            &ctx.vec3(U_POINT_SPECULAR),
        );
        additive(rgb * falloff * shadow)
    }
}

//=================================
// Spot light
//=================================

const SPOT_UNIFORMS: &[(&str, UniformKind)] = mesh_uniforms!(
    "light_position" => Vec3,
    "light_direction" => Vec3,
    "light_diffuse" => Vec3,
    "light_specular" => Vec3,
    "attenuation" => Float,
    "shadow_view_projection" => Mat4,
    "shadow_far" => Float,
    "shadow_map" => Sampler2D,
    "shadow_bias" => Float,
    "cone_outer" => Float,
    "cone_inner" => Float,
);
const U_SPOT_POSITION: usize = 14;
const U_SPOT_DIRECTION: usize = 15;
const U_SPOT_DIFFUSE: usize = 16;
const U_SPOT_SPECULAR: usize = 17;
const U_SPOT_ATTENUATION: usize = 18;
const U_SPOT_SHADOW_VP: usize = 19;
const U_SPOT_FAR: usize = 20;
const U_SPOT_SHADOW_MAP: usize = 21;
const U_SPOT_BIAS: usize = 22;
const U_SPOT_CONE_OUTER: usize = 23;
const U_SPOT_CONE_INNER: usize = 24;

/// Cone light. `cone_outer`/`cone_inner` are cosines of the half angles
/// between which the cone fades out.
pub struct MeshSpotLightKernel;

impl ShaderKernel for MeshSpotLightKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: INPUTS,
            uniforms: SPOT_UNIFORMS,
            outputs: &["color"],
            defines: &[SHADOWS],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        mesh_vertex(ctx, inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let s = surface(ctx, v)?;
        let light_world = ctx.vec3(U_SPOT_POSITION);

        let ray = s.world_pos - light_world;
        let distance = ray.norm();
        let cos_angle = ray.dot(&ctx.vec3(U_SPOT_DIRECTION)) / distance.max(1e-6);
        let outer = ctx.float(U_SPOT_CONE_OUTER);
        let inner = ctx.float(U_SPOT_CONE_INNER).max(outer + 1e-4);
        let cone = ((cos_angle - outer) / (inner - outer)).clamp(0.0, 1.0);
        if cone <= 0.0 {
            return additive(Vector3::zeros());
        }

        let mut shadow = 1.0;
        if ctx.defined(SHADOWS) {
            let clip = ctx.mat4(U_SPOT_SHADOW_VP) * s.world_pos.push(1.0);
            let uv = clip.xy() / clip.w * 0.5 + nalgebra::Vector2::repeat(0.5);
            let stored = ctx.sample(U_SPOT_SHADOW_MAP, uv).x;
            let current = distance / ctx.float(U_SPOT_FAR);
            shadow = lit(current, stored, ctx.float(U_SPOT_BIAS));
        }

        let light_view = (ctx.mat4(U_VIEW) * light_world.push(1.0)).xyz();
        let l = (light_view - s.view_pos).normalize();
        let falloff = 1.0 / (1.0 + ctx.float(U_SPOT_ATTENUATION) * distance * distance);
        let rgb = blinn_phong(
            ctx,
            &s,
            &l,
            &ctx.vec3(U_SPOT_DIFFUSE),
            &ctx.vec3(U_SPOT_SPECULAR),
        );
        additive(rgb * (falloff * cone * cone * (3.0 - 2.0 * cone) * shadow))
    }
}

//=================================
// Directional light
//=================================

const DIRECTIONAL_UNIFORMS: &[(&str, UniformKind)] = mesh_uniforms!(
    "light_direction" => Vec3,
    "light_diffuse" => Vec3,
    "light_specular" => Vec3,
    "shadow_view_projection" => Mat4,
    "shadow_map" => Sampler2D,
    "shadow_bias" => Float,
);
const U_DIR_DIRECTION: usize = 14;
const U_DIR_DIFFUSE: usize = 15;
const U_DIR_SPECULAR: usize = 16;
const U_DIR_SHADOW_VP: usize = 17;
const U_DIR_SHADOW_MAP: usize = 18;
const U_DIR_BIAS: usize = 19;

/// Parallel light; the shadow map stores window depth of its ortho camera.
pub struct MeshDirectionalLightKernel;

impl ShaderKernel for MeshDirectionalLightKernel {
    fn interface(&self) -> ShaderInterface {
        ShaderInterface {
            inputs: INPUTS,
            uniforms: DIRECTIONAL_UNIFORMS,
            outputs: &["color"],
            defines: &[SHADOWS],
            writes_depth: false,
            geometry_stage: false,
        }
    }

    fn vertex(&self, ctx: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
        mesh_vertex(ctx, inputs)
    }

    fn fragment(&self, ctx: &ShaderContext, v: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
        let s = surface(ctx, v)?;

        let mut shadow = 1.0;
        if ctx.defined(SHADOWS) {
            let clip = ctx.mat4(U_DIR_SHADOW_VP) * s.world_pos.push(1.0);
            let ndc = clip.xyz() / clip.w;
            let uv = ndc.xy() * 0.5 + nalgebra::Vector2::repeat(0.5);
            let stored = ctx.sample(U_DIR_SHADOW_MAP, uv).x;
            shadow = lit(ndc.z * 0.5 + 0.5, stored, ctx.float(U_DIR_BIAS));
        }

        let direction = (ctx.mat4(U_VIEW) * ctx.vec3(U_DIR_DIRECTION).push(0.0)).xyz();
        let l = -direction.normalize();
        let rgb = blinn_phong(
            ctx,
            &s,
            &l,
            &ctx.vec3(U_DIR_DIFFUSE),
            &ctx.vec3(U_DIR_SPECULAR),
        );
        additive(rgb * shadow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_slots_line_up() {
        for uniforms in [AMBIENT_UNIFORMS, POINT_UNIFORMS, SPOT_UNIFORMS, DIRECTIONAL_UNIFORMS] {
            assert_eq!(uniforms[U_WORLD].0, "world");
            assert_eq!(uniforms[U_MAP_BUMP].0, "map_bump");
        }
        assert_eq!(AMBIENT_UNIFORMS[U_AMBIENT_LIGHT].0, "ambient_light");
        assert_eq!(POINT_UNIFORMS[U_POINT_BIAS].0, "shadow_bias");
        assert_eq!(SPOT_UNIFORMS[U_SPOT_CONE_INNER].0, "cone_inner");
        assert_eq!(DIRECTIONAL_UNIFORMS[U_DIR_BIAS].0, "shadow_bias");
    }

    #[test]
    fn shadow_comparison_honours_bias() {
        assert_eq!(lit(0.5, 0.5, 0.005), 1.0);
        assert_eq!(lit(0.504, 0.5, 0.005), 1.0);
        assert_eq!(lit(0.6, 0.5, 0.005), 0.0);
    }
}
