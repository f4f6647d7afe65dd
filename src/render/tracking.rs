use std::collections::BTreeSet;

use log::warn;

use super::{GeometryHandle, GpuBackend, MaterialHandle, ResourceCounts, TextureHandle};
use crate::scene_graph::{Geometry, Material, TextureData};

/// Resource released through a [`TrackingBackend`], in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasedResource {
    Geometry(GeometryHandle),
    Texture(TextureHandle),
    Material(MaterialHandle),
}

/// Headless backend that only keeps book of what is alive.
///
/// Used when no GPU adapter is available and by tests that need to observe
/// allocation and release behaviour.
#[derive(Debug, Default)]
pub struct TrackingBackend {
    next_id: u64,
    geometries: BTreeSet<GeometryHandle>,
    textures: BTreeSet<TextureHandle>,
    materials: BTreeSet<MaterialHandle>,
    released: Vec<ReleasedResource>,
    invalid_releases: usize,
}

impl TrackingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful release so far.
    pub fn released(&self) -> &[ReleasedResource] {
        &self.released
    }

    /// Releases of handles that were unknown or already released.
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    pub fn is_live_geometry(&self, handle: GeometryHandle) -> bool {
        self.geometries.contains(&handle)
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, removed: bool, resource: ReleasedResource) {
        if removed {
            self.released.push(resource);
        } else {
            warn!("release of unknown GPU resource {resource:?}");
            self.invalid_releases += 1;
        }
    }
}

impl GpuBackend for TrackingBackend {
    fn create_geometry(&mut self, _label: &str, _geometry: &Geometry) -> GeometryHandle {
        let handle = GeometryHandle(self.allocate());
        self.geometries.insert(handle);
        handle
    }

    fn create_texture(&mut self, _label: &str, _texture: &TextureData) -> TextureHandle {
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle);
        handle
    }

    fn create_material(
        &mut self,
        _label: &str,
        _material: &Material,
        _texture: Option<TextureHandle>,
    ) -> MaterialHandle {
        let handle = MaterialHandle(self.allocate());
        self.materials.insert(handle);
        handle
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        let removed = self.geometries.remove(&handle);
        self.record(removed, ReleasedResource::Geometry(handle));
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        let removed = self.textures.remove(&handle);
        self.record(removed, ReleasedResource::Texture(handle));
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        let removed = self.materials.remove(&handle);
        self.record(removed, ReleasedResource::Material(handle));
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometries.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
        }
    }
}
