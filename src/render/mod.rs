//! GPU resource ownership for displayed models.
//!
//! The stage never talks to a graphics API directly. Everything that has to
//! live on the GPU goes through a [`GpuBackend`], which hands out opaque
//! handles and is told explicitly when to release them.

pub mod native;
pub mod tracking;

pub use native::WgpuBackend;
pub use tracking::{ReleasedResource, TrackingBackend};

use log::debug;

use crate::scene_graph::{Geometry, Material, SceneAsset, TextureData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u64);

/// Number of live resources per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub textures: usize,
    pub materials: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.geometries + self.textures + self.materials
    }
}

/// Creates and releases the GPU objects backing a scene asset.
pub trait GpuBackend {
    fn create_geometry(&mut self, label: &str, geometry: &Geometry) -> GeometryHandle;
    fn create_texture(&mut self, label: &str, texture: &TextureData) -> TextureHandle;
    fn create_material(
        &mut self,
        label: &str,
        material: &Material,
        texture: Option<TextureHandle>,
    ) -> MaterialHandle;
    fn release_geometry(&mut self, handle: GeometryHandle);
    fn release_texture(&mut self, handle: TextureHandle);
    fn release_material(&mut self, handle: MaterialHandle);
    fn live_resources(&self) -> ResourceCounts;
}

impl<T> GpuBackend for Box<T>
where
    T: GpuBackend + ?Sized,
{
    fn create_geometry(&mut self, label: &str, geometry: &Geometry) -> GeometryHandle {
        (**self).create_geometry(label, geometry)
    }

    fn create_texture(&mut self, label: &str, texture: &TextureData) -> TextureHandle {
        (**self).create_texture(label, texture)
    }

    fn create_material(
        &mut self,
        label: &str,
        material: &Material,
        texture: Option<TextureHandle>,
    ) -> MaterialHandle {
        (**self).create_material(label, material, texture)
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        (**self).release_geometry(handle)
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        (**self).release_texture(handle)
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        (**self).release_material(handle)
    }

    fn live_resources(&self) -> ResourceCounts {
        (**self).live_resources()
    }
}

/// Uploads every texture, material and mesh of `asset` that is not resident yet.
///
/// Textures go first so materials can bind them. Returns what was created.
pub fn upload_asset<B>(asset: &mut SceneAsset, backend: &mut B) -> ResourceCounts
where
    B: GpuBackend + ?Sized,
{
    let mut created = ResourceCounts::default();
    let SceneAsset {
        root,
        materials,
        textures,
        ..
    } = asset;

    for texture in textures.iter_mut().filter(|texture| texture.gpu.is_none()) {
        texture.gpu = Some(backend.create_texture(&texture.name, texture));
        created.textures += 1;
    }

    for material in materials.iter_mut().filter(|material| material.gpu.is_none()) {
        let texture = material
            .texture
            .and_then(|index| textures.get(index))
            .and_then(|texture| texture.gpu);
        material.gpu = Some(backend.create_material(&material.name, material, texture));
        created.materials += 1;
    }

    let label = root.name.clone();
    root.visit_meshes_mut(&mut |mesh| {
        if mesh.gpu.is_none() {
            let mesh_label = format!("{label}-mesh{}", created.geometries);
            mesh.gpu = Some(backend.create_geometry(&mesh_label, &mesh.geometry));
            created.geometries += 1;
        }
    });

    debug!(
        "uploaded {label}: {} geometries, {} textures, {} materials",
        created.geometries, created.textures, created.materials
    );
    created
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::scene_graph::{AssetOrigin, MeshNode, Node};

    fn textured_asset() -> SceneAsset {
        let geometry = Geometry::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![0, 1, 2],
        );
        let root = Node::group("model")
            .with_child(Node::mesh("a", MeshNode::new(geometry.clone(), 0)))
            .with_child(Node::mesh("b", MeshNode::new(geometry, 0)));
        let mut material = Material::new("skin", Vec4::ONE);
        material.texture = Some(0);
        let mut asset = SceneAsset::new(root, vec![material], AssetOrigin::Placeholder);
        asset
            .textures
            .push(TextureData::new("albedo", 1, 1, vec![255, 255, 255, 255]));
        asset
    }

    #[test]
    fn upload_shares_material_and_texture_between_meshes() {
        let mut backend = TrackingBackend::new();
        let mut asset = textured_asset();
        let created = upload_asset(&mut asset, &mut backend);
        assert_eq!(
            created,
            ResourceCounts {
                geometries: 2,
                textures: 1,
                materials: 1
            }
        );
        assert_eq!(backend.live_resources(), created);
        assert!(asset.is_resident());
    }

    #[test]
    fn second_upload_creates_nothing() {
        let mut backend = TrackingBackend::new();
        let mut asset = textured_asset();
        upload_asset(&mut asset, &mut backend);
        let created = upload_asset(&mut asset, &mut backend);
        assert_eq!(created.total(), 0);
        assert_eq!(backend.live_resources().total(), 4);
    }

    #[test]
    fn boxed_backend_forwards_calls() {
        let mut backend: Box<dyn GpuBackend> = Box::new(TrackingBackend::new());
        let mut asset = textured_asset();
        upload_asset(&mut asset, &mut backend);
        assert_eq!(backend.live_resources().geometries, 2);
    }
}
