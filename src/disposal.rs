use log::debug;

use crate::render::GpuBackend;
use crate::scene_graph::SceneAsset;
use crate::stage::{ModelId, Stage};

/// Resources released by one disposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub geometries: usize,
    pub textures: usize,
    pub materials: usize,
}

impl DisposalReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.geometries + self.textures + self.materials
    }
}

/// Detaches `id` from the stage and releases everything it owns on the GPU.
///
/// Does nothing when `id` is not attached, so repeated calls are harmless.
pub fn dispose<B>(stage: &mut Stage, backend: &mut B, id: ModelId) -> DisposalReport
where
    B: GpuBackend + ?Sized,
{
    let Some(mut asset) = stage.detach(id) else {
        return DisposalReport::default();
    };
    let report = release_asset(&mut asset, backend);
    debug!(
        "disposed {:?} ({}): {} geometries, {} textures, {} materials",
        id, asset.root.name, report.geometries, report.textures, report.materials
    );
    report
}

/// Releases every GPU handle held by a detached asset.
///
/// Per mesh the order is geometry, then the material's texture, then the
/// material. Handles are taken out as they are released, so shared
/// materials and textures go exactly once.
pub fn release_asset<B>(asset: &mut SceneAsset, backend: &mut B) -> DisposalReport
where
    B: GpuBackend + ?Sized,
{
    let mut report = DisposalReport::default();
    let SceneAsset {
        root,
        materials,
        textures,
        ..
    } = asset;

    root.visit_meshes_mut(&mut |mesh| {
        if let Some(handle) = mesh.gpu.take() {
            backend.release_geometry(handle);
            report.geometries += 1;
        }
        let Some(material) = materials.get_mut(mesh.material) else {
            return;
        };
        if let Some(texture) = material.texture.and_then(|index| textures.get_mut(index)) {
            if let Some(handle) = texture.gpu.take() {
                backend.release_texture(handle);
                report.textures += 1;
            }
        }
        if let Some(handle) = material.gpu.take() {
            backend.release_material(handle);
            report.materials += 1;
        }
    });

    // uploaded but never referenced by a mesh
    for material in materials.iter_mut() {
        if let Some(handle) = material.gpu.take() {
            backend.release_material(handle);
            report.materials += 1;
        }
    }
    for texture in textures.iter_mut() {
        if let Some(handle) = texture.gpu.take() {
            backend.release_texture(handle);
            report.textures += 1;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::config::StageConfig;
    use crate::placeholder::generate_placeholder;
    use crate::render::{upload_asset, ReleasedResource, TrackingBackend};
    use crate::scene_graph::{AssetOrigin, Geometry, Material, MeshNode, Node, TextureData};
    use crate::theme::ThemeColor;

    fn textured_pair() -> SceneAsset {
        let geometry = Geometry::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], Vec::new(), vec![0, 1, 2]);
        let root = Node::group("pair")
            .with_child(Node::mesh("left", MeshNode::new(geometry.clone(), 0)))
            .with_child(Node::mesh("right", MeshNode::new(geometry, 0)));
        let mut material = Material::new("skin", Vec4::ONE);
        material.texture = Some(0);
        let mut asset = SceneAsset::new(
            root,
            vec![material, Material::new("unused", Vec4::ONE)],
            AssetOrigin::Loaded {
                path: "pair.glb".into(),
            },
        );
        asset
            .textures
            .push(TextureData::new("albedo", 1, 1, vec![0, 0, 0, 255]));
        asset
    }

    #[test]
    fn releases_geometry_then_texture_then_material() {
        let mut backend = TrackingBackend::new();
        let mut stage = Stage::new(&StageConfig::default());
        let mut asset = textured_pair();
        upload_asset(&mut asset, &mut backend);
        let id = stage.attach(asset);

        let report = dispose(&mut stage, &mut backend, id);
        assert_eq!(
            report,
            DisposalReport {
                geometries: 2,
                textures: 1,
                materials: 2
            }
        );
        let order: Vec<_> = backend
            .released()
            .iter()
            .map(|resource| match resource {
                ReleasedResource::Geometry(_) => 'g',
                ReleasedResource::Texture(_) => 't',
                ReleasedResource::Material(_) => 'm',
            })
            .collect();
        assert_eq!(order, vec!['g', 't', 'm', 'g', 'm']);
        assert_eq!(backend.live_resources().total(), 0);
        assert_eq!(backend.invalid_releases(), 0);
    }

    #[test]
    fn disposal_is_idempotent() {
        let mut backend = TrackingBackend::new();
        let mut stage = Stage::new(&StageConfig::default());
        let mut asset = generate_placeholder(ThemeColor::new(10, 20, 30));
        upload_asset(&mut asset, &mut backend);
        let id = stage.attach(asset);

        assert!(!dispose(&mut stage, &mut backend, id).is_empty());
        assert!(dispose(&mut stage, &mut backend, id).is_empty());
        assert_eq!(backend.invalid_releases(), 0);
    }

    #[test]
    fn nothing_stays_reachable() {
        let mut backend = TrackingBackend::new();
        let mut stage = Stage::new(&StageConfig::default());
        let mut asset = generate_placeholder(ThemeColor::new(10, 20, 30));
        upload_asset(&mut asset, &mut backend);
        let id = stage.attach(asset);
        dispose(&mut stage, &mut backend, id);
        assert_eq!(stage.reachable_nodes(), 0);
        assert!(stage.draw_list().is_empty());
    }

    #[test]
    fn shared_placeholder_material_goes_once() {
        let mut backend = TrackingBackend::new();
        let mut asset = generate_placeholder(ThemeColor::new(1, 1, 1));
        upload_asset(&mut asset, &mut backend);
        let report = release_asset(&mut asset, &mut backend);
        assert_eq!(report.geometries, 3);
        assert_eq!(report.materials, 1);
        assert!(!asset.is_resident());
        assert!(release_asset(&mut asset, &mut backend).is_empty());
    }
}
