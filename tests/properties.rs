use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene_renderer::core::buffer::Buffer;
use scene_renderer::core::device::{BlendMode, Filter, FramebufferId, TextureFormat, Wrap};
use scene_renderer::core::gpu::Gpu;
use scene_renderer::core::software::SoftwareDevice;
use scene_renderer::core::texture::Texture2D;
use scene_renderer::core::tracing::TracingDevice;
use scene_renderer::pipeline::cache::ResourceCache;
use scene_renderer::pipeline::quad::{QuadRenderer, SCREEN_QUAD};
use scene_renderer::pipeline::renderer::{RenderSettings, Renderer};
use scene_renderer::pipeline::shadow_renderer::cube_face_camera;
use scene_renderer::scene::Scene;
use scene_renderer::scene::camera::{Camera, Viewpoint};
use scene_renderer::scene::geometry::{Geometry, Vertex};
use scene_renderer::scene::light::{AmbientLight, PointLight};
use scene_renderer::scene::material::Material;
use scene_renderer::scene::mesh::{Mesh, cube, plane, sphere};
use scene_renderer::scene::object::Object;

fn unit_vector(rng: &mut StdRng) -> Vector3<f32> {
    loop {
        let v: Vector3<f32> = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let n = v.norm();
        if n > 1e-3 && n <= 1.0 {
            return v / n;
        }
    }
}

fn random_geometry(rng: &mut StdRng, triangles: usize) -> Geometry {
    let mut geometry = Geometry::new();
    for _ in 0..triangles {
        let mut corner = || {
            Vertex::new(
                Point3::new(
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                ),
                Vector2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)),
                Vector3::zeros(),
            )
        };
        let (a, b, c) = (corner(), corner(), corner());
        geometry.append_triangle(a, b, c);
    }
    geometry
}

#[test]
fn random_matrices_invert_to_identity() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut checked = 0;
    while checked < 1000 {
        let m = Matrix4::<f32>::from_fn(|_, _| rng.random_range(-10.0..10.0));
        let Some(inverse) = m.try_inverse() else {
            continue;
        };
        // Nearly singular draws are not meaningful in single precision.
        if m.amax() * inverse.amax() > 1e3 {
            continue;
        }
        let deviation = (m * inverse - Matrix4::identity()).amax();
        assert!(deviation <= 1e-2, "deviation {} for {}", deviation, m);
        checked += 1;
    }
}

#[test]
fn rotated_basis_stays_orthonormal() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut object = Object::new();
    for step in 0..2000 {
        let axis = unit_vector(&mut rng);
        object.rotate(&axis, rng.random_range(-std::f32::consts::PI..std::f32::consts::PI));

        let basis = [object.ux(), object.uy(), object.uz()];
        for i in 0..3 {
            assert!((basis[i].norm() - 1.0).abs() < 1e-4, "step {}: |U{}| drifted", step, i);
            for j in i + 1..3 {
                assert!(basis[i].dot(&basis[j]).abs() < 1e-4, "step {}: U{} . U{}", step, i, j);
            }
        }
    }
}

/// Number of cube-face view volumes containing `direction` (with a small
/// tolerance on the side planes).
fn faces_containing(cameras: &[Matrix4<f32>], direction: &Vector3<f32>) -> usize {
    let p = (direction * 5.0).push(1.0);
    cameras
        .iter()
        .filter(|vp| {
            let clip = *vp * p;
            let slack = clip.w * 1e-4;
            clip.w > 0.0 && clip.x.abs() <= clip.w + slack && clip.y.abs() <= clip.w + slack
        })
        .count()
}

#[test]
fn cube_faces_cover_every_direction() {
    let cameras: Vec<Matrix4<f32>> = (0..6)
        .map(|f| cube_face_camera(Point3::origin(), f, 10.0).view_projection())
        .collect();

    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..5000 {
        let d = unit_vector(&mut rng);
        let count = faces_containing(&cameras, &d);
        assert!((1..=2).contains(&count), "{} faces contain {:?}", count, d);
    }

    for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
        assert_eq!(faces_containing(&cameras, &axis), 1);
        assert_eq!(faces_containing(&cameras, &-axis), 1);
    }
    let edge = Vector3::new(1.0, 1.0, 0.0).normalize();
    assert_eq!(faces_containing(&cameras, &edge), 2);
}

#[test]
fn bounding_spheres_contain_their_vertices() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut geometries = vec![cube(), plane(7.0, 3.0), sphere(2.5, 24, 12)];
    for n in [1, 5, 40] {
        geometries.push(random_geometry(&mut rng, n));
    }

    for geometry in geometries {
        let mesh = Mesh::single("bounds", geometry, Material::default());
        let submesh = &mesh.submeshes[0];
        let local = submesh.geometry.bounding_sphere();
        for v in submesh.geometry.verts() {
            assert!((v.position() - local.center).norm() <= local.radius + 1e-4);
        }

        let mut object = Object::new();
        object.set_position(Point3::new(1.0, -2.0, 3.0));
        object.rotate(&unit_vector(&mut rng), 0.7);
        object.set_scale(Vector3::new(2.0, 0.5, 1.5));
        let world = object.world_matrix();
        let sphere = submesh.world_sphere(&world);
        for v in submesh.geometry.verts() {
            let p = world.transform_point(&v.position());
            assert!((p - sphere.center).norm() <= sphere.radius + 1e-3);
        }
    }
}

#[test]
fn tangents_are_orthogonal_to_normals() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut geometries = vec![cube(), plane(2.0, 2.0), sphere(1.0, 16, 8)];
    for _ in 0..20 {
        let mut geometry = random_geometry(&mut rng, 8);
        geometry.calculate_normals();
        geometries.push(geometry);
    }

    for mut geometry in geometries {
        geometry.calculate_tangents();
        for v in geometry.verts() {
            assert!(v.normal().dot(&v.tangent()).abs() < 1e-3);
            assert!((v.tangent().norm() - 1.0).abs() < 1e-3);
        }
    }
}

#[test]
fn repeated_upload_reuses_buffers_without_device_calls() {
    let device = TracingDevice::new(SoftwareDevice::new(4, 4));
    let counts = device.counts();
    let mut gpu = Gpu::new(device);
    let mut cache = ResourceCache::new();
    let geometry = sphere(1.0, 8, 4);

    let first = {
        let b = cache.geometry_buffers(&mut gpu, &geometry);
        (b.vertices.id(), b.indices.id())
    };
    let calls = counts.total();
    assert!(counts.get("create_buffer") == 2 && counts.get("write_buffer") == 2);

    let second = {
        let b = cache.geometry_buffers(&mut gpu, &geometry);
        (b.vertices.id(), b.indices.id())
    };
    assert_eq!(first, second);
    assert_eq!(counts.total(), calls);
    assert_eq!(cache.geometry_count(), 1);
}

#[test]
fn statistics_count_every_draw() {
    let device = TracingDevice::new(SoftwareDevice::new(8, 8));
    let counts = device.counts();
    let mut gpu = Gpu::new(device);

    let mut quad = QuadRenderer::new(&mut gpu).unwrap();
    let texture = Texture2D::new(&mut gpu, TextureFormat::Rgba8, Filter::Nearest, Wrap::EdgeClamp, 2, 2);
    gpu.stats.reset();
    for _ in 0..5 {
        quad.blit(&mut gpu, &texture, FramebufferId::DEFAULT, BlendMode::Off);
    }
    assert_eq!(gpu.stats.draw_calls, 5);
    assert_eq!(gpu.stats.vertices, 5 * SCREEN_QUAD.len() as u64);

    // A full frame: every device draw is accounted for.
    let settings = RenderSettings {
        width: 16,
        height: 16,
        ..RenderSettings::default()
    };
    let mut renderer = Renderer::new(&mut gpu, settings).unwrap();
    let mut scene = Scene::new();
    scene.ambient = Some(AmbientLight::new(Vector3::repeat(0.2)));
    scene.add_mesh(Mesh::single("cube", cube(), Material::default()));
    scene.add_point_light(PointLight::new(
        Point3::new(0.0, 3.0, 2.0),
        Vector3::repeat(1.0),
        Vector3::repeat(1.0),
        0.0,
    ));
    let camera = Camera::new_perspective(
        Point3::new(0.0, 0.0, 3.0),
        Point3::origin(),
        Vector3::y(),
        1.0,
        1.0,
        0.1,
        20.0,
    );
    let before = counts.get("draw_arrays") + counts.get("draw_indexed");
    renderer.render(&mut gpu, &scene, &camera).unwrap();
    let draws = counts.get("draw_arrays") + counts.get("draw_indexed") - before;

    assert_eq!(gpu.stats.draw_calls, draws as u64);
    // Ambient pass, one light pass, two compositing blits.
    assert_eq!(gpu.stats.draw_calls, 4);
    assert_eq!(gpu.stats.vertices, 36 + 36 + 2 * SCREEN_QUAD.len() as u64);
}

#[test]
fn buffers_grow_to_the_largest_write() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut gpu = Gpu::software(4, 4);
    let mut buffer = Buffer::new(&mut gpu);

    let mut largest = 0;
    for _ in 0..50 {
        let size = rng.random_range(1..4096);
        let payload: Vec<u8> = (0..size).map(|_| rng.random()).collect();
        buffer.set_bytes(&mut gpu, &payload, 0);
        largest = largest.max(size);

        assert_eq!(buffer.capacity(), largest);
        let stored = gpu.device().read_buffer(buffer.id());
        assert_eq!(stored.len(), largest);
        assert_eq!(&stored[..size], payload.as_slice());
    }
}
