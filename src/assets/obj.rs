use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec3, Vec4};

use super::LoadFailure;
use crate::scene_graph::{AssetOrigin, Geometry, Material, MeshNode, Node, SceneAsset};

/// Decodes an OBJ file into a single-mesh asset with a neutral material.
pub fn load_obj(path: &str, bytes: &[u8]) -> Result<SceneAsset, LoadFailure> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| LoadFailure::Malformed(format!("OBJ is not UTF-8: {err}")))?;
    let geometry = parse_obj(text).map_err(|err| LoadFailure::Malformed(format!("{err:#}")))?;
    let root = Node::group(path).with_child(Node::mesh("obj", MeshNode::new(geometry, 0)));
    let material = Material::new("obj-default", Vec4::new(0.8, 0.8, 0.8, 1.0));
    Ok(SceneAsset::new(
        root,
        vec![material],
        AssetOrigin::Loaded { path: path.into() },
    ))
}

/// Parses OBJ text into indexed geometry. Polygons are fan triangulated.
pub fn parse_obj(data: &str) -> Result<Geometry> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                for i in 1..(polygon.len() - 1) {
                    faces.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut geometry = build_geometry(&positions, &normals, &faces)?;
    if geometry.needs_normals() {
        geometry.compute_normals();
    }
    Ok(geometry)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    position: i32,
    normal: i32,
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        // v, v/vt, v//vn or v/vt/vn; texture coordinates are not used
        let mut segments = part.split('/');
        let position = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let normal = segments
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .map(str::parse::<i32>)
            .transpose()?
            .unwrap_or(0);
        indices.push(FaceIndex { position, normal });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    normal: Option<usize>,
}

fn build_geometry(
    positions: &[Vec3],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<Geometry> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut geometry = Geometry::default();

    for face in faces {
        for index in face {
            let position = resolve_index(index.position, positions.len())
                .ok_or_else(|| anyhow!("vertex index {} out of range", index.position))?;
            let normal = resolve_index(index.normal, normals.len());
            let key = Key { position, normal };
            let next = geometry.positions.len() as u32;
            let vertex = *lookup.entry(key).or_insert_with(|| {
                geometry.positions.push(positions[position]);
                geometry
                    .normals
                    .push(normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO));
                next
            });
            geometry.indices.push(vertex);
        }
    }

    Ok(geometry)
}

/// OBJ indices are 1-based; negative values count back from the end.
fn resolve_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let geometry = parse_obj("\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert_eq!(geometry.vertex_count(), 3);
    }

    #[test]
    fn computes_missing_normals() {
        let geometry = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        for normal in &geometry.normals {
            assert!((*normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn keeps_explicit_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2//1 3//1\n";
        let geometry = parse_obj(obj).unwrap();
        assert!(geometry.normals.iter().all(|normal| *normal == Vec3::NEG_Z));
    }

    #[test]
    fn fan_triangulates_quads_with_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf -4 -3 -2 -1\n";
        let geometry = parse_obj(obj).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn rejects_out_of_range_faces() {
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n").is_err());
        assert!(parse_obj("# only a comment\n").is_err());
    }

    #[test]
    fn load_obj_wraps_a_single_mesh() {
        let asset = load_obj("./tri.obj", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(asset.root.mesh_count(), 1);
        assert_eq!(asset.materials.len(), 1);
        assert_eq!(
            asset.origin,
            AssetOrigin::Loaded {
                path: "./tri.obj".into()
            }
        );
        assert!(matches!(
            load_obj("bad.obj", b"f 1 2 3\n"),
            Err(LoadFailure::Malformed(_))
        ));
    }
}
