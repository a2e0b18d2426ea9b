use crate::scene::geometry::{Geometry, Vertex};
use crate::scene::image::Image;
use crate::scene::material::Material;
use crate::scene::mesh::{Mesh, SubMesh};
use log::{debug, info, warn};
use nalgebra::{Point3, Vector2, Vector3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads an OBJ file (and its MTL libraries) as a mesh with one submesh per
/// material, in order of first use.
///
/// Without `smooth` every triangle corner gets its own vertex, so computed
/// normals are per face. With `smooth`, or a nonzero `s` group in a file
/// without normals, corners sharing a position and texcoord are welded and
/// normals are averaged across faces.
pub fn load_obj<P: AsRef<Path>>(path: P, smooth: bool) -> Result<Mesh, String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()));
    }
    info!("Loading OBJ file: {}", path.display());

    let load_options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    };
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read OBJ {}: {}", path.display(), e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let (models, materials) =
        tobj::load_obj_buf(&mut source.as_bytes(), &load_options, |mtl: &Path| {
            tobj::load_mtl(base.join(mtl))
        })
        .map_err(|e| format!("Failed to load OBJ {}: {}", path.display(), e))?;
    let materials = materials.unwrap_or_else(|e| {
        warn!("No usable materials for {}: {}", path.display(), e);
        Vec::new()
    });

    let mut images = ImageCache::new(base);
    let materials: Vec<Arc<Material>> = materials
        .iter()
        .map(|m| Arc::new(convert_material(m, &mut images)))
        .collect();
    let fallback = Arc::new(Material::default());

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "obj".to_string());
    let mut mesh = Mesh::new(name);

    // Groups and objects only split tobj models; submeshes follow `usemtl`.
    let mut groups: Vec<(Option<usize>, Vec<&tobj::Model>)> = Vec::new();
    for model in &models {
        let key = model.mesh.material_id.filter(|&id| id < materials.len());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(model),
            None => groups.push((key, vec![model])),
        }
    }

    let smoothing_groups = declares_smoothing_groups(&source);
    if smoothing_groups {
        debug!("{} declares smoothing groups", path.display());
    }
    for (key, members) in groups {
        let mut geometry = Geometry::new();
        for model in members {
            let smooth = smooth || (smoothing_groups && model.mesh.normal_indices.is_empty());
            append_model(&mut geometry, &model.mesh, smooth)
                .map_err(|e| format!("Model '{}' in {}: {}", model.name, path.display(), e))?;
        }
        if geometry.triangle_count() == 0 {
            continue;
        }
        geometry.calculate_tangents();
        geometry
            .validate()
            .map_err(|e| format!("{}: {}", path.display(), e))?;

        let material = key
            .map(|id| materials[id].clone())
            .unwrap_or_else(|| fallback.clone());
        debug!(
            "Submesh with material '{}': {} triangles",
            material.name,
            geometry.triangle_count()
        );
        mesh.push(SubMesh::new(Arc::new(geometry), material));
    }

    info!(
        "OBJ loaded successfully. Submeshes: {}, total indices: {}",
        mesh.submeshes.len(),
        mesh.index_count()
    );
    Ok(mesh)
}

/// True when any `s` statement names a group other than `off`/`0`.
fn declares_smoothing_groups(source: &str) -> bool {
    source.lines().any(|line| {
        let mut parts = line.split_whitespace();
        parts.next() == Some("s") && !matches!(parts.next(), None | Some("off") | Some("0"))
    })
}

/// Appends one tobj model. Normals are computed when the file has none or
/// when `smooth` asks for them; with `smooth` corners sharing a position and
/// texcoord are welded first.
fn append_model(geometry: &mut Geometry, mesh: &tobj::Mesh, smooth: bool) -> Result<(), String> {
    let has_normals = !mesh.normal_indices.is_empty() && !smooth;
    let has_texcoords = !mesh.texcoord_indices.is_empty();

    let position = |i: usize| -> Result<Point3<f32>, String> {
        mesh.positions
            .get(i * 3..i * 3 + 3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .ok_or_else(|| format!("position index {} out of range", i))
    };
    let texcoord = |corner: usize| -> Vector2<f32> {
        if !has_texcoords {
            return Vector2::zeros();
        }
        let i = mesh.texcoord_indices[corner] as usize;
        mesh.texcoords
            .get(i * 2..i * 2 + 2)
            .map_or(Vector2::zeros(), |t| Vector2::new(t[0], t[1]))
    };
    let normal = |corner: usize| -> Vector3<f32> {
        if !has_normals {
            return Vector3::zeros();
        }
        let i = mesh.normal_indices[corner] as usize;
        mesh.normals
            .get(i * 3..i * 3 + 3)
            .map_or(Vector3::zeros(), |n| Vector3::new(n[0], n[1], n[2]))
    };

    // Normals of this model only, so earlier models keep theirs.
    let mut part = Geometry::new();
    let mut welded: HashMap<(u32, u32), u32> = HashMap::new();
    for (t, corners) in mesh.indices.chunks_exact(3).enumerate() {
        let first = t * 3;
        let mut face = [0u32; 3];
        for (k, &index) in corners.iter().enumerate() {
            let corner = first + k;
            let vertex = Vertex::new(position(index as usize)?, texcoord(corner), normal(corner));
            face[k] = if smooth {
                let uv = if has_texcoords { mesh.texcoord_indices[corner] } else { 0 };
                *welded
                    .entry((index, uv))
                    .or_insert_with(|| part.push_vertex(vertex))
            } else {
                part.push_vertex(vertex)
            };
        }
        part.push_face(face[0], face[1], face[2]);
    }
    if !has_normals {
        part.calculate_normals();
    }

    let base = geometry.verts().len() as u32;
    for v in part.verts() {
        geometry.push_vertex(*v);
    }
    for f in part.faces().chunks_exact(3) {
        geometry.push_face(base + f[0], base + f[1], base + f[2]);
    }
    Ok(())
}

fn convert_material(m: &tobj::Material, images: &mut ImageCache) -> Material {
    let mut material = Material::new(m.name.clone());
    if let Some(ka) = m.ambient {
        material.ambient = Vector3::from(ka);
    }
    if let Some(kd) = m.diffuse {
        material.diffuse = Vector3::from(kd);
    }
    if let Some(ks) = m.specular {
        material.specular = Vector3::from(ks);
    }
    if let Some(ns) = m.shininess {
        material.shininess = ns;
    }
    if let Some(d) = m.dissolve {
        material.opacity = d;
    }

    if let Some(path) = &m.ambient_texture {
        material.ambient_map = images.color(path);
    }
    if let Some(path) = &m.diffuse_texture {
        material.diffuse_map = images.color(path);
    }
    if let Some(path) = &m.specular_texture {
        material.specular_map = images.color(path);
    }
    if let Some(path) = &m.dissolve_texture {
        material.alpha_map = images.color(path);
    }
    if let Some(path) = &m.normal_texture {
        material.bump_map = images.bump(path);
    }
    material
}

/// Loads each referenced image once; missing files fall back to the sentinels.
struct ImageCache<'a> {
    base: &'a Path,
    color: HashMap<PathBuf, Arc<Image>>,
    bump: HashMap<PathBuf, Arc<Image>>,
}

impl<'a> ImageCache<'a> {
    fn new(base: &'a Path) -> Self {
        Self {
            base,
            color: HashMap::new(),
            bump: HashMap::new(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn color(&mut self, path: &str) -> Arc<Image> {
        let path = self.resolve(path);
        self.color
            .entry(path)
            .or_insert_with_key(|p| match Image::load(p) {
                Ok(image) => Arc::new(image),
                Err(e) => {
                    warn!("{}; using a white texture", e);
                    Image::white_transparent()
                }
            })
            .clone()
    }

    /// Grayscale height maps are converted to tangent-space normals once.
    fn bump(&mut self, path: &str) -> Arc<Image> {
        let path = self.resolve(path);
        self.bump
            .entry(path)
            .or_insert_with_key(|p| match Image::load(p) {
                Ok(image) => Arc::new(image.bump_to_normal()),
                Err(e) => {
                    warn!("{}; using a flat normal map", e);
                    Image::flat_normal()
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-renderer-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn quads_are_fan_triangulated_with_materials() {
        let dir = temp_dir("quad");
        fs::write(
            dir.join("quad.mtl"),
            "newmtl red\nKd 1 0 0\nNs 10\nmap_Kd missing.png\n",
        )
        .unwrap();
        fs::write(
            dir.join("quad.obj"),
            "mtllib quad.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nusemtl red\nf 1 2 3 4\n",
        )
        .unwrap();

        let mesh = load_obj(dir.join("quad.obj"), false).unwrap();
        assert_eq!(mesh.submeshes.len(), 1);
        let sub = &mesh.submeshes[0];
        assert_eq!(sub.geometry.faces().len(), 6);
        assert_eq!(sub.material.name, "red");
        assert_eq!(sub.material.diffuse, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(sub.material.shininess, 10.0);
        // The missing texture falls back to the shared sentinel.
        assert_eq!(sub.material.diffuse_map.id(), Image::white_transparent().id());
        for v in sub.geometry.verts() {
            assert!((v.normal() - Vector3::z()).norm() < 1e-5);
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_obj("does/not/exist.obj", false).is_err());
    }

    #[test]
    fn smooth_welds_shared_corners() {
        let dir = temp_dir("smooth");
        fs::write(
            dir.join("tent.obj"),
            "v -1 0 0\nv 0 1 0\nv 0 1 -1\nv -1 0 -1\nv 1 0 0\nv 1 0 -1\nf 1 2 3 4\nf 2 5 6 3\n",
        )
        .unwrap();
        let mesh = load_obj(dir.join("tent.obj"), true).unwrap();
        let geometry = &mesh.submeshes[0].geometry;
        assert_eq!(geometry.verts().len(), 6);
        // Unwelded, the ridge would keep a 45 degree slope normal.
        let ridge = geometry.verts()[1].normal();
        assert!(ridge.y > 0.9);

        // A smoothing group welds as well; `s off` keeps faces flat.
        let tent = "v -1 0 0\nv 0 1 0\nv 0 1 -1\nv -1 0 -1\nv 1 0 0\nv 1 0 -1\n";
        fs::write(dir.join("grouped.obj"), format!("{tent}s 1\nf 1 2 3 4\nf 2 5 6 3\n")).unwrap();
        fs::write(dir.join("flat.obj"), format!("{tent}s off\nf 1 2 3 4\nf 2 5 6 3\n")).unwrap();
        let grouped = load_obj(dir.join("grouped.obj"), false).unwrap();
        assert_eq!(grouped.submeshes[0].geometry.verts().len(), 6);
        let flat = load_obj(dir.join("flat.obj"), false).unwrap();
        assert_eq!(flat.submeshes[0].geometry.verts().len(), 12);
    }

    #[test]
    fn groups_merge_into_one_submesh_per_material() {
        let dir = temp_dir("groups");
        fs::write(dir.join("ab.mtl"), "newmtl a\nKd 1 0 0\nnewmtl b\nKd 0 1 0\n").unwrap();
        fs::write(
            dir.join("groups.obj"),
            "mtllib ab.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             g left\nusemtl a\nf 1 2 3\n\
             g right\nusemtl a\nf 1 3 4\n\
             g top\nusemtl b\nf 2 3 4\n",
        )
        .unwrap();

        let mesh = load_obj(dir.join("groups.obj"), false).unwrap();
        let names: Vec<&str> = mesh.submeshes.iter().map(|s| s.material.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(mesh.submeshes[0].geometry.triangle_count(), 2);
        assert_eq!(mesh.submeshes[1].geometry.triangle_count(), 1);
        assert_eq!(mesh.index_count(), 9);
    }

    #[test]
    fn smoothing_statements_are_recognised() {
        assert!(declares_smoothing_groups("v 0 0 0\ns 1\nf 1 1 1\n"));
        assert!(!declares_smoothing_groups("s off\ns 0\n# s 1\n"));
        assert!(!declares_smoothing_groups("v 0 0 0\n"));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = temp_dir("unreadable");
        let err = load_obj(&dir, false).unwrap_err();
        assert!(err.contains("Failed to read OBJ"), "{err}");
    }
}
