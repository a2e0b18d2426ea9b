use image::RgbaImage;
use nalgebra::{Point3, Vector3};
use scene_renderer::core::gpu::Gpu;
use scene_renderer::io::obj_loader::load_obj;
use scene_renderer::pipeline::renderer::{RenderSettings, Renderer};
use scene_renderer::pipeline::shadow_renderer::ShadowSettings;
use scene_renderer::scene::Scene;
use scene_renderer::scene::camera::{Camera, Viewpoint};
use scene_renderer::scene::light::{AmbientLight, DirectionalLight, PointLight, SpotLight};
use scene_renderer::scene::material::Material;
use scene_renderer::scene::mesh::{Mesh, cube, plane, sphere};
use std::collections::BTreeSet;
use std::fs;

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

fn camera(eye: Point3<f32>, far: f32) -> Camera {
    Camera::new_perspective(
        eye,
        Point3::origin(),
        Vector3::y(),
        60f32.to_radians(),
        1.0,
        0.1,
        far,
    )
}

fn settings(size: usize) -> RenderSettings {
    RenderSettings {
        width: size,
        height: size,
        shadows: ShadowSettings {
            cube_size: 128,
            map_size: 256,
            ..ShadowSettings::default()
        },
        ..RenderSettings::default()
    }
}

/// Renders one frame and returns the scene target together with the renderer.
fn render(scene: &Scene, camera: &Camera, settings: RenderSettings) -> (RgbaImage, Renderer, Gpu) {
    let mut gpu = Gpu::software(settings.width, settings.height);
    let mut renderer = Renderer::new(&mut gpu, settings).unwrap();
    renderer.render(&mut gpu, scene, camera).unwrap();
    let image = renderer.scene_image(&gpu).unwrap();
    (image, renderer, gpu)
}

/// Pixel (top-left origin) that `point` projects to.
fn pixel_of(camera: &Camera, point: Point3<f32>, size: usize) -> (u32, u32) {
    let clip = camera.view_projection() * point.to_homogeneous();
    let (x, y) = (clip.x / clip.w, clip.y / clip.w);
    let col = ((x + 1.0) * 0.5 * size as f32).floor() as u32;
    let row = ((1.0 - y) * 0.5 * size as f32).floor() as u32;
    (col, row)
}

fn intensity(image: &RgbaImage, (x, y): (u32, u32)) -> f32 {
    let p = image.get_pixel(x, y).0;
    (p[0] as f32 + p[1] as f32 + p[2] as f32) / (3.0 * 255.0)
}

fn ambient_cube_scene() -> Scene {
    let mut scene = Scene::new();
    scene.ambient = Some(AmbientLight::new(Vector3::repeat(0.2)));
    let material = Material::new("white").with_diffuse(Vector3::repeat(1.0));
    scene.add_mesh(Mesh::single("cube", cube(), material));
    scene
}

#[test]
fn single_cube_ambient_only() {
    let size = 32;
    let (image, _, _) = render(&ambient_cube_scene(), &camera(Point3::new(0.0, 0.0, 3.0), 50.0), settings(size));

    let centre = image.get_pixel(16, 16).0;
    for c in &centre[..3] {
        assert!(c.abs_diff(51) <= 1, "centre {:?}", centre);
    }
    for (x, y) in [(0, 0), (31, 0), (0, 31), (31, 31)] {
        assert_eq!(image.get_pixel(x, y).0, BACKGROUND);
    }
}

#[test]
fn wireframe_leaves_faces_empty() {
    let size = 96;
    // Off-axis so three faces are visible and no edge crosses the centre.
    let camera = camera(Point3::new(1.5, 0.75, 2.5), 50.0);
    let wireframe = RenderSettings {
        wireframe: true,
        ..settings(size)
    };
    let (image, _, _) = render(&ambient_cube_scene(), &camera, wireframe);

    let centre = (size / 2) as u32;
    assert_eq!(image.get_pixel(centre, centre).0, BACKGROUND);

    let lit_near = |(x, y): (u32, u32)| {
        (x.saturating_sub(2)..=x + 2)
            .flat_map(|i| (y.saturating_sub(2)..=y + 2).map(move |j| (i, j)))
            .any(|(i, j)| image.get_pixel(i, j).0 != BACKGROUND)
    };
    // All twelve edges, the hidden ones included.
    let corners: Vec<Point3<f32>> = (0..8)
        .map(|i| {
            let c = |bit: usize| if i & bit == 0 { -0.5 } else { 0.5 };
            Point3::new(c(1), c(2), c(4))
        })
        .collect();
    let mut edges = 0;
    for (i, a) in corners.iter().enumerate() {
        for (j, b) in corners.iter().enumerate().skip(i + 1) {
            if (i ^ j).count_ones() != 1 {
                continue;
            }
            edges += 1;
            for t in [0.25, 0.5, 0.75] {
                let point = a + (b - a) * t;
                assert!(lit_near(pixel_of(&camera, point, size)), "no edge near {:?}", point);
            }
        }
    }
    assert_eq!(edges, 12);
}

#[test]
fn point_light_casts_a_shadow_disc() {
    let size = 64;
    let mut scene = Scene::new();
    scene.add_mesh(Mesh::single("floor", plane(20.0, 20.0), Material::new("floor")));
    let mut ball = Mesh::single("ball", sphere(1.0, 32, 16), Material::new("ball"));
    ball.object.set_position(Point3::new(0.0, 2.0, 0.0));
    scene.add_mesh(ball);
    scene.add_point_light(
        PointLight::new(
            Point3::new(0.0, 5.0, 0.0),
            Vector3::repeat(1.0),
            Vector3::repeat(0.2),
            0.0,
        )
        .with_shadows(25.0),
    );

    let camera = camera(Point3::new(0.0, 10.0, 10.0), 50.0);
    let (image, _, _) = render(&scene, &camera, settings(size));

    let shadowed = intensity(&image, pixel_of(&camera, Point3::origin(), size));
    let lit = intensity(&image, pixel_of(&camera, Point3::new(2.0, 0.0, 0.0), size));
    assert!(lit - shadowed >= 0.3, "lit {} vs shadowed {}", lit, shadowed);
}

/// A floor with a unit ball hovering above the origin.
fn ball_over_floor() -> Scene {
    let mut scene = Scene::new();
    scene.add_mesh(Mesh::single("floor", plane(20.0, 20.0), Material::new("floor")));
    let mut ball = Mesh::single("ball", sphere(1.0, 32, 16), Material::new("ball"));
    ball.object.set_position(Point3::new(0.0, 2.0, 0.0));
    scene.add_mesh(ball);
    scene
}

/// Intensity difference between a lit floor point and the point under the ball.
fn shadow_contrast(scene: &Scene) -> f32 {
    let size = 64;
    let camera = camera(Point3::new(0.0, 10.0, 10.0), 50.0);
    let (image, _, _) = render(scene, &camera, settings(size));
    let shadowed = intensity(&image, pixel_of(&camera, Point3::origin(), size));
    let lit = intensity(&image, pixel_of(&camera, Point3::new(2.0, 0.0, 0.0), size));
    lit - shadowed
}

#[test]
fn spot_light_casts_a_shadow_disc() {
    let mut scene = ball_over_floor();
    let mut spot = SpotLight::new(
        Point3::new(0.0, 5.0, 0.0),
        Point3::origin(),
        std::f32::consts::FRAC_PI_2,
        20.0,
        Vector3::repeat(1.0),
        Vector3::repeat(0.2),
        0.0,
    );
    spot.cast_shadows = true;
    scene.add_spot_light(spot);

    let contrast = shadow_contrast(&scene);
    assert!(contrast >= 0.3, "contrast {}", contrast);
}

#[test]
fn directional_light_casts_a_shadow_disc() {
    let mut scene = ball_over_floor();
    let mut sun = DirectionalLight::new(
        Point3::new(0.0, 10.0, 0.0),
        Point3::origin(),
        8.0,
        30.0,
        Vector3::repeat(1.0),
        Vector3::repeat(0.2),
    );
    sun.cast_shadows = true;
    scene.add_directional_light(sun);

    let contrast = shadow_contrast(&scene);
    assert!(contrast >= 0.3, "contrast {}", contrast);
}

#[test]
fn directional_shadow_ends_at_its_extent() {
    let size = 64;
    let mut scene = Scene::new();
    scene.add_mesh(Mesh::single("floor", plane(20.0, 20.0), Material::new("floor")));
    // Wider than the shadow volume, so every texel of the map holds it.
    let mut slab = Mesh::single("slab", cube(), Material::new("slab"));
    slab.object.set_position(Point3::new(0.0, 3.0, 0.0));
    slab.object.set_scale(Vector3::new(4.2, 0.2, 4.2));
    scene.add_mesh(slab);
    let mut sun = DirectionalLight::new(
        Point3::new(0.0, 10.0, 0.0),
        Point3::origin(),
        4.0,
        30.0,
        Vector3::repeat(1.0),
        Vector3::zeros(),
    );
    sun.cast_shadows = true;
    scene.add_directional_light(sun);

    let camera = camera(Point3::new(0.0, 10.0, 10.0), 50.0);
    let (image, _, _) = render(&scene, &camera, settings(size));

    let under = intensity(&image, pixel_of(&camera, Point3::new(1.0, 0.0, 0.0), size));
    let outside = intensity(&image, pixel_of(&camera, Point3::new(5.0, 0.0, 0.0), size));
    assert!(under <= 0.1, "under the slab {}", under);
    assert!(outside >= 0.5, "outside the extent {}", outside);
}

#[test]
fn cloned_light_keeps_its_own_shadow_map() {
    let size = 64;
    let white = Vector3::repeat(0.5);
    let first = PointLight::new(Point3::new(0.0, 5.0, 0.0), white, Vector3::zeros(), 0.0).with_shadows(25.0);
    let moved = Point3::new(6.0, 5.0, 0.0);

    let mut cloned = ball_over_floor();
    let mut copy = first.clone();
    copy.set_position(moved);
    cloned.add_point_light(first.clone());
    cloned.add_point_light(copy);

    let mut fresh = ball_over_floor();
    fresh.add_point_light(first);
    fresh.add_point_light(PointLight::new(moved, white, Vector3::zeros(), 0.0).with_shadows(25.0));

    let camera = camera(Point3::new(0.0, 10.0, 10.0), 50.0);
    let (a, _, _) = render(&cloned, &camera, settings(size));
    let (b, _, _) = render(&fresh, &camera, settings(size));
    for (x, y, pixel) in a.enumerate_pixels() {
        let other = b.get_pixel(x, y).0;
        for c in 0..3 {
            assert!(pixel.0[c].abs_diff(other[c]) <= 1, "pixel ({}, {}): {:?} vs {:?}", x, y, pixel.0, other);
        }
    }
}

fn two_light_scene(first: bool, second: bool) -> Scene {
    let mut scene = Scene::new();
    scene.ambient = Some(AmbientLight::new(Vector3::repeat(0.1)));
    scene.add_mesh(Mesh::single("floor", plane(10.0, 10.0), Material::new("floor")));
    let mut block = Mesh::single(
        "block",
        cube(),
        Material::new("block").with_specular(Vector3::repeat(0.8), 32.0),
    );
    block.object.set_position(Point3::new(0.0, 0.5, 0.0));
    scene.add_mesh(block);

    if first {
        scene.add_point_light(PointLight::new(
            Point3::new(-2.0, 3.0, 2.0),
            Vector3::new(0.8, 0.4, 0.2),
            Vector3::repeat(0.5),
            0.02,
        ));
    }
    if second {
        scene.add_point_light(PointLight::new(
            Point3::new(2.0, 3.0, -1.0),
            Vector3::new(0.2, 0.4, 0.8),
            Vector3::repeat(0.5),
            0.02,
        ));
    }
    scene
}

#[test]
fn light_passes_add_up() {
    let size = 48;
    let camera = camera(Point3::new(0.0, 4.0, 6.0), 50.0);
    let frame = |first, second| render(&two_light_scene(first, second), &camera, settings(size)).0;

    let both = frame(true, true);
    let only_first = frame(true, false);
    let only_second = frame(false, true);
    let ambient = frame(false, false);

    for (x, y, pixel) in both.enumerate_pixels() {
        let a = ambient.get_pixel(x, y).0;
        let l1 = only_first.get_pixel(x, y).0;
        let l2 = only_second.get_pixel(x, y).0;
        for c in 0..3 {
            let expected = (l1[c] as i32 - a[c] as i32) + (l2[c] as i32 - a[c] as i32) + a[c] as i32;
            let expected = expected.clamp(0, 255);
            let got = pixel.0[c] as i32;
            assert!(
                (got - expected).abs() <= 2,
                "pixel ({}, {}) channel {}: {} vs {}",
                x,
                y,
                c,
                got,
                expected
            );
        }
    }
}

#[test]
fn mesh_behind_camera_is_culled() {
    let camera = camera(Point3::new(0.0, 0.0, 3.0), 50.0);
    let scene = |with_hidden: bool| {
        let mut scene = ambient_cube_scene();
        scene.add_point_light(PointLight::new(
            Point3::new(0.0, 2.0, 2.0),
            Vector3::repeat(1.0),
            Vector3::repeat(1.0),
            0.0,
        ));
        if with_hidden {
            let mut hidden = Mesh::single("hidden", cube(), Material::new("hidden"));
            hidden.object.set_position(Point3::new(0.0, 0.0, 10.0));
            scene.add_mesh(hidden);
        }
        scene
    };

    let (_, renderer, gpu) = render(&scene(true), &camera, settings(16));
    let items = renderer.mesh_renderer().items();
    assert_eq!(items.len(), 1);
    assert!(items.iter().all(|item| item.mesh == 0));
    let with_hidden = gpu.stats.vertices;

    let (_, _, gpu) = render(&scene(false), &camera, settings(16));
    assert_eq!(gpu.stats.vertices, with_hidden);
}

const CUBE_OBJ: &str = "\
# unit cube, 8 vertices, 12 triangles
v -0.5 -0.5  0.5
v  0.5 -0.5  0.5
v -0.5  0.5  0.5
v  0.5  0.5  0.5
v -0.5  0.5 -0.5
v  0.5  0.5 -0.5
v -0.5 -0.5 -0.5
v  0.5 -0.5 -0.5
f 1 2 3
f 3 2 4
f 3 4 5
f 5 4 6
f 5 6 7
f 7 6 8
f 7 8 1
f 1 8 2
f 2 8 4
f 4 8 6
f 7 1 5
f 5 1 3
";

#[test]
fn obj_cube_has_six_face_normals() {
    let dir = std::env::temp_dir().join(format!("scene-renderer-cube-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("cube.obj");
    fs::write(&path, CUBE_OBJ).unwrap();

    let mesh = load_obj(&path, false).unwrap();
    assert_eq!(mesh.submeshes.len(), 1);
    assert_eq!(mesh.index_count(), 36);

    let normals: BTreeSet<[i32; 3]> = mesh.submeshes[0]
        .geometry
        .verts()
        .iter()
        .map(|v| {
            let n = v.normal();
            [n.x.round() as i32, n.y.round() as i32, n.z.round() as i32]
        })
        .collect();
    let expected: BTreeSet<[i32; 3]> = [
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
    ]
    .into_iter()
    .collect();
    assert_eq!(normals, expected);

    for v in mesh.submeshes[0].geometry.verts() {
        let n = v.normal();
        assert!((n.norm() - 1.0).abs() < 1e-5);
        assert!(n.iter().filter(|c| c.abs() > 1e-5).count() == 1);
    }
}
