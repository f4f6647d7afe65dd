//! Scene root of the character stage.

use std::collections::BTreeMap;

use glam::{Mat4, Quat};
use log::debug;

use crate::config::StageConfig;
use crate::particles::ParticleField;
use crate::render::{GeometryHandle, MaterialHandle};
use crate::scene_graph::{Node, SceneAsset};
use crate::theme::ThemeSynchronizer;

/// Identifies a model while it is attached to the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u64);

#[derive(Debug)]
struct AttachedModel {
    asset: SceneAsset,
    spin: f32,
}

/// One mesh ready to be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub model: ModelId,
    pub world: Mat4,
    pub geometry: GeometryHandle,
    pub material: Option<MaterialHandle>,
    pub wireframe: bool,
}

#[derive(Debug)]
pub struct Stage {
    models: BTreeMap<ModelId, AttachedModel>,
    next_id: u64,
    theme: ThemeSynchronizer,
    particles: ParticleField,
    spin_speed: f32,
}

impl Stage {
    pub fn new(config: &StageConfig) -> Self {
        Self {
            models: BTreeMap::new(),
            next_id: 1,
            theme: ThemeSynchronizer::new(config),
            particles: ParticleField::new(&config.particles),
            spin_speed: config.spin_speed,
        }
    }

    pub fn attach(&mut self, asset: SceneAsset) -> ModelId {
        let id = ModelId(self.next_id);
        self.next_id += 1;
        debug!("attached model {} as {:?}", asset.root.name, id);
        self.models.insert(id, AttachedModel { asset, spin: 0.0 });
        id
    }

    /// Removes the model from the scene root and hands ownership back.
    pub fn detach(&mut self, id: ModelId) -> Option<SceneAsset> {
        self.models.remove(&id).map(|model| model.asset)
    }

    pub fn is_attached(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn attached_count(&self) -> usize {
        self.models.len()
    }

    pub fn model(&self, id: ModelId) -> Option<&SceneAsset> {
        self.models.get(&id).map(|model| &model.asset)
    }

    pub fn model_root_mut(&mut self, id: ModelId) -> Option<&mut Node> {
        self.models.get_mut(&id).map(|model| &mut model.asset.root)
    }

    /// Turntable angle of an attached model, in radians.
    pub fn model_spin(&self, id: ModelId) -> Option<f32> {
        self.models.get(&id).map(|model| model.spin)
    }

    pub fn theme(&self) -> &ThemeSynchronizer {
        &self.theme
    }

    pub fn theme_mut(&mut self) -> &mut ThemeSynchronizer {
        &mut self.theme
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    /// Spins attached models and drifts the particle field.
    pub fn advance(&mut self, delta: f32) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        for model in self.models.values_mut() {
            model.spin += self.spin_speed * delta;
        }
        self.particles.advance(delta);
    }

    /// Nodes reachable from the scene root, excluding the root itself.
    pub fn reachable_nodes(&self) -> usize {
        self.models
            .values()
            .map(|model| model.asset.root.node_count())
            .sum()
    }

    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        for (&id, model) in &self.models {
            let pivot = Mat4::from_quat(Quat::from_rotation_y(model.spin));
            let materials = &model.asset.materials;
            model
                .asset
                .root
                .visit_meshes_with_matrix(pivot, &mut |world, mesh| {
                    let Some(geometry) = mesh.gpu else {
                        return;
                    };
                    let material = materials.get(mesh.material);
                    items.push(DrawItem {
                        model: id,
                        world,
                        geometry,
                        material: material.and_then(|material| material.gpu),
                        wireframe: material.is_some_and(|material| material.wireframe),
                    });
                });
        }
        items
    }
}
