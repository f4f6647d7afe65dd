use std::collections::HashMap;
use std::path::Path;

use glam::{Quat, Vec3, Vec4};
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation as GltfInterpolation, Property};
use gltf::mesh::Mode;
use log::{debug, warn};

use super::LoadFailure;
use crate::animation::{
    keyframes_are_ordered, AnimationClip, Channel, ChannelValues, Interpolation,
};
use crate::scene_graph::{
    AssetOrigin, Geometry, Material, MeshNode, Node, NodePath, SceneAsset, TextureData, Transform,
};

const MAX_NODE_DEPTH: usize = 64;

/// Decodes a `.glb` or `.gltf` file. External buffers and images are
/// resolved relative to `base`.
pub fn load_gltf(path: &str, bytes: &[u8], base: Option<&Path>) -> Result<SceneAsset, LoadFailure> {
    let malformed = |err: gltf::Error| LoadFailure::Malformed(err.to_string());
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).map_err(malformed)?;
    let buffers = gltf::import_buffers(&document, base, blob).map_err(malformed)?;
    let images = gltf::import_images(&document, base, &buffers).map_err(malformed)?;

    let mut importer = Importer {
        buffers: &buffers,
        materials: Vec::new(),
        material_lookup: HashMap::new(),
        default_material: None,
        paths: HashMap::new(),
    };

    let mut textures = Vec::new();
    let mut texture_lookup = HashMap::new();
    for texture in document.textures() {
        let source = texture.source();
        let Some(image) = images.get(source.index()) else {
            continue;
        };
        let Some(rgba) = convert_image_to_rgba(image) else {
            warn!(
                "{path}: texture {} uses unsupported pixel format {:?}; skipping",
                texture.index(),
                image.format
            );
            continue;
        };
        let name = texture
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("texture_{}", texture.index()));
        texture_lookup.insert(texture.index(), textures.len());
        textures.push(TextureData::new(name, image.width, image.height, rgba));
    }

    for (position, material) in document.materials().enumerate() {
        let pbr = material.pbr_metallic_roughness();
        let name = material
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("material_{position}"));
        let mut converted = Material::new(name, Vec4::from_array(pbr.base_color_factor()));
        converted.emissive = Vec3::from_array(material.emissive_factor());
        converted.texture = pbr
            .base_color_texture()
            .and_then(|info| texture_lookup.get(&info.texture().index()).copied());
        importer
            .material_lookup
            .insert(material.index().unwrap_or(position), importer.materials.len());
        importer.materials.push(converted);
    }

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadFailure::Malformed("file contains no scenes".into()))?;

    let mut root = Node::group(scene.name().unwrap_or("scene"));
    for (index, node) in scene.nodes().enumerate() {
        let child = importer.import_node(&node, NodePath::root().child(index), 0)?;
        root.children.push(child);
    }
    if root.mesh_count() == 0 {
        return Err(LoadFailure::Malformed(
            "scene contains no triangle meshes".into(),
        ));
    }

    let clips = import_clips(&document, &buffers, &importer.paths, path);
    debug!(
        "{path}: {} nodes, {} meshes, {} materials, {} textures, {} clips",
        root.node_count(),
        root.mesh_count(),
        importer.materials.len(),
        textures.len(),
        clips.len()
    );

    let mut asset = SceneAsset::new(
        root,
        importer.materials,
        AssetOrigin::Loaded { path: path.into() },
    );
    asset.textures = textures;
    asset.clips = clips;
    Ok(asset)
}

struct Importer<'a> {
    buffers: &'a [gltf::buffer::Data],
    materials: Vec<Material>,
    material_lookup: HashMap<usize, usize>,
    default_material: Option<usize>,
    /// glTF node index to its place in the imported tree.
    paths: HashMap<usize, NodePath>,
}

impl Importer<'_> {
    fn import_node(
        &mut self,
        node: &gltf::Node<'_>,
        path: NodePath,
        depth: usize,
    ) -> Result<Node, LoadFailure> {
        if depth >= MAX_NODE_DEPTH {
            return Err(LoadFailure::Malformed(format!(
                "node hierarchy deeper than {MAX_NODE_DEPTH} levels"
            )));
        }
        let (translation, rotation, scale) = node.transform().decomposed();
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mut imported = Node::group(name).with_transform(Transform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
        });
        self.paths.insert(node.index(), path.clone());

        for (index, child) in node.children().enumerate() {
            let child = self.import_node(&child, path.child(index), depth + 1)?;
            imported.children.push(child);
        }

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    debug!("skipping non-triangle primitive {:?}", primitive.mode());
                    continue;
                }
                let Some(geometry) = self.read_geometry(&primitive) else {
                    continue;
                };
                let material = self.material_for(&primitive);
                let label = format!(
                    "{}_{}",
                    mesh.name().unwrap_or("mesh"),
                    primitive.index()
                );
                imported
                    .children
                    .push(Node::mesh(label, MeshNode::new(geometry, material)));
            }
        }
        Ok(imported)
    }

    fn read_geometry(&self, primitive: &gltf::Primitive<'_>) -> Option<Geometry> {
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from_array).collect();
        if positions.is_empty() {
            return None;
        }
        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|normals| normals.map(Vec3::from_array).collect())
            .unwrap_or_default();
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());

        let mut geometry = Geometry::new(positions, normals, indices);
        if geometry.needs_normals() {
            geometry.compute_normals();
        }
        Some(geometry)
    }

    fn material_for(&mut self, primitive: &gltf::Primitive<'_>) -> usize {
        if let Some(index) = primitive
            .material()
            .index()
            .and_then(|index| self.material_lookup.get(&index))
        {
            return *index;
        }
        *self.default_material.get_or_insert_with(|| {
            self.materials
                .push(Material::new("default", Vec4::new(0.8, 0.8, 0.8, 1.0)));
            self.materials.len() - 1
        })
    }
}

fn import_clips(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    paths: &HashMap<usize, NodePath>,
    path: &str,
) -> Vec<AnimationClip> {
    let mut clips = Vec::new();
    for (position, animation) in document.animations().enumerate() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation_{position}"));
        let mut channels = Vec::new();

        for channel in animation.channels() {
            let target = channel.target();
            let Some(node_path) = paths.get(&target.node().index()) else {
                continue;
            };
            let sampler = channel.sampler().interpolation();
            let interpolation = match sampler {
                GltfInterpolation::Step => Interpolation::Step,
                GltfInterpolation::Linear | GltfInterpolation::CubicSpline => {
                    Interpolation::Linear
                }
            };

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            let Some(outputs) = reader.read_outputs() else {
                continue;
            };
            let values = match (target.property(), outputs) {
                (Property::Translation, ReadOutputs::Translations(values)) => {
                    ChannelValues::Translation(values.map(Vec3::from_array).collect())
                }
                (Property::Scale, ReadOutputs::Scales(values)) => {
                    ChannelValues::Scale(values.map(Vec3::from_array).collect())
                }
                (Property::Rotation, ReadOutputs::Rotations(rotations)) => ChannelValues::Rotation(
                    rotations.into_f32().map(Quat::from_array).collect(),
                ),
                _ => continue,
            };
            let values = if matches!(sampler, GltfInterpolation::CubicSpline) {
                spline_keyframes(values)
            } else {
                values
            };

            if times.is_empty() || values.len() != times.len() {
                warn!(
                    "{path}: animation '{name}' channel for node {} has {} times and {} values; skipping",
                    target.node().index(),
                    times.len(),
                    values.len()
                );
                continue;
            }
            if !keyframes_are_ordered(&times) {
                warn!(
                    "{path}: animation '{name}' channel for node {} has non-finite or unordered keyframe times; skipping",
                    target.node().index()
                );
                continue;
            }
            channels.push(Channel {
                target: node_path.clone(),
                interpolation,
                times,
                values,
            });
        }

        if channels.is_empty() {
            continue;
        }
        clips.push(AnimationClip::new(name, channels));
    }
    clips
}

/// Cubic spline outputs are (in-tangent, value, out-tangent) triplets.
fn spline_keyframes(values: ChannelValues) -> ChannelValues {
    fn middle<T: Copy>(values: Vec<T>) -> Vec<T> {
        values.chunks_exact(3).map(|triplet| triplet[1]).collect()
    }
    match values {
        ChannelValues::Translation(values) => ChannelValues::Translation(middle(values)),
        ChannelValues::Rotation(values) => ChannelValues::Rotation(middle(values)),
        ChannelValues::Scale(values) => ChannelValues::Scale(middle(values)),
    }
}

fn convert_image_to_rgba(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;

    match image.format {
        Format::R8 => Some(
            image
                .pixels
                .iter()
                .flat_map(|&value| [value, value, value, 255])
                .collect(),
        ),
        Format::R8G8 => Some(
            image
                .pixels
                .chunks_exact(2)
                .flat_map(|chunk| [chunk[0], chunk[1], 0, 255])
                .collect(),
        ),
        Format::R8G8B8 => Some(
            image
                .pixels
                .chunks_exact(3)
                .flat_map(|chunk| [chunk[0], chunk[1], chunk[2], 255])
                .collect(),
        ),
        Format::R8G8B8A8 => Some(image.pixels.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Triangle positions, two keyframe times and two translations.
    const BUFFER: &str = "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAEAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAA=";
    // Same buffer with the first keyframe time set to NaN.
    const NAN_TIME_BUFFER: &str = "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAEAAAAAAAADAfwAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAA=";
    // Same buffer with keyframe times 1.0 then 0.0.
    const REVERSED_TIME_BUFFER: &str = "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAEAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAAAAAACAPwAAAAA=";

    fn animated_triangle() -> String {
        triangle_with_buffer(BUFFER)
    }

    fn triangle_with_buffer(buffer: &str) -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "hips", "children": [1] }},
    {{ "name": "torso", "mesh": 0, "translation": [0.0, 0.5, 0.0] }}
  ],
  "meshes": [{{ "name": "body", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }}],
  "materials": [{{
    "name": "red",
    "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.0, 0.0, 1.0] }},
    "emissiveFactor": [0.0, 0.0, 1.0]
  }}],
  "animations": [{{
    "name": "bob",
    "samplers": [{{ "input": 1, "output": 2, "interpolation": "LINEAR" }}],
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }}]
  }}],
  "buffers": [{{ "byteLength": 68, "uri": "{buffer}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 24 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 2.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" }}
  ]
}}"#
        )
    }

    #[test]
    fn imports_nodes_meshes_and_materials() {
        let asset = load_gltf("bob.gltf", animated_triangle().as_bytes(), None).unwrap();
        assert_eq!(asset.root.mesh_count(), 1);
        let torso = asset.root.descendant(&NodePath::from(vec![0, 0])).unwrap();
        assert_eq!(torso.name, "torso");
        assert_eq!(torso.transform.translation, Vec3::new(0.0, 0.5, 0.0));

        let mesh = torso.children[0].as_mesh().unwrap();
        assert_eq!(mesh.geometry.indices, vec![0, 1, 2]);
        assert!(!mesh.geometry.needs_normals());
        assert_eq!(asset.materials[mesh.material].base_color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(asset.materials[mesh.material].emissive, Vec3::Z);

        let bounds = asset.root.bounds().unwrap();
        assert!((bounds.height() - 2.0).abs() < 1e-5);
        assert!((bounds.min.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn imports_translation_channels() {
        let asset = load_gltf("bob.gltf", animated_triangle().as_bytes(), None).unwrap();
        assert_eq!(asset.clips.len(), 1);
        let clip = &asset.clips[0];
        assert_eq!(clip.name, "bob");
        assert_eq!(clip.duration, 1.0);
        assert_eq!(clip.channels[0].target, NodePath::from(vec![0, 0]));
        assert_eq!(
            clip.channels[0].values,
            ChannelValues::Translation(vec![Vec3::ZERO, Vec3::Y])
        );
    }

    #[test]
    fn skips_channels_with_bad_keyframe_times() {
        for buffer in [NAN_TIME_BUFFER, REVERSED_TIME_BUFFER] {
            let asset =
                load_gltf("bob.gltf", triangle_with_buffer(buffer).as_bytes(), None).unwrap();
            assert_eq!(asset.root.mesh_count(), 1);
            assert!(asset.clips.is_empty());
        }
    }

    #[test]
    fn rejects_files_without_meshes() {
        let json = r#"{ "asset": { "version": "2.0" }, "scenes": [{ "nodes": [0] }], "nodes": [{}] }"#;
        let err = load_gltf("empty.gltf", json.as_bytes(), None).unwrap_err();
        assert!(matches!(err, LoadFailure::Malformed(_)));
    }

    #[test]
    fn spline_keeps_the_middle_of_each_triplet() {
        let values = ChannelValues::Scale(vec![Vec3::ZERO, Vec3::ONE, Vec3::ZERO]);
        assert_eq!(spline_keyframes(values), ChannelValues::Scale(vec![Vec3::ONE]));
    }
}
