use glam::Vec3;

use crate::primitives::{cuboid, cylinder, icosphere};
use crate::scene_graph::{AssetOrigin, Material, MeshNode, Node, SceneAsset, Transform};
use crate::theme::ThemeColor;

const HEAD_HEIGHT: f32 = 1.6;
const SHOULDER_HEIGHT: f32 = 1.4;
const BODY_HEIGHT: f32 = 1.1;

/// Builds the wireframe stand-in shown when a model cannot be loaded.
///
/// The silhouette is already at stage scale with its origin on the floor, so
/// it is attached without normalization. All three parts share one emissive
/// wireframe material tinted with `theme`.
pub fn generate_placeholder(theme: ThemeColor) -> SceneAsset {
    let color = theme.to_vec3();
    let mut material = Material::new("placeholder", color.extend(1.0));
    material.wireframe = true;
    material.emissive = color;
    material.emissive_intensity = 0.5;

    let part = |name: &str, geometry, height: f32| {
        Node::mesh(name, MeshNode::new(geometry, 0))
            .with_transform(Transform::from_translation(Vec3::new(0.0, height, 0.0)))
    };

    let root = Node::group("placeholder")
        .with_child(part("head", icosphere(0.15, 1), HEAD_HEIGHT))
        .with_child(part("body", cylinder(0.05, 0.2, 0.7, 8), BODY_HEIGHT))
        .with_child(part("shoulders", cuboid(0.6, 0.1, 0.2), SHOULDER_HEIGHT));

    SceneAsset::new(root, vec![material], AssetOrigin::Placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_tinted_wireframe() {
        let theme = ThemeColor::new(0xFF, 0x33, 0x33);
        let asset = generate_placeholder(theme);
        assert!(asset.is_placeholder());
        assert_eq!(asset.materials.len(), 1);
        let material = &asset.materials[0];
        assert!(material.wireframe);
        assert_eq!(material.base_color.truncate(), theme.to_vec3());
        assert_eq!(material.emissive, theme.to_vec3());
        assert_eq!(material.emissive_intensity, 0.5);
        assert!(asset.clips.is_empty());
    }

    #[test]
    fn every_part_shares_the_material() {
        let asset = generate_placeholder(ThemeColor::new(0, 0, 0));
        let mut materials = Vec::new();
        asset.root.visit_meshes(&mut |mesh| materials.push(mesh.material));
        assert_eq!(materials, vec![0, 0, 0]);
    }

    #[test]
    fn silhouette_stands_above_the_floor() {
        let asset = generate_placeholder(ThemeColor::new(1, 2, 3));
        let bounds = asset.root.bounds().unwrap();
        assert!((bounds.max.y - 1.75).abs() < 1e-4);
        assert!((bounds.min.y - 0.75).abs() < 1e-4);
        assert!((bounds.size().x - 0.6).abs() < 1e-4);
        assert!(bounds.center().x.abs() < 1e-4);
    }

    #[test]
    fn generation_is_deterministic() {
        let theme = ThemeColor::new(9, 9, 9);
        assert_eq!(generate_placeholder(theme).root, generate_placeholder(theme).root);
    }
}
