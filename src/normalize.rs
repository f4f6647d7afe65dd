use glam::{Quat, Vec3};
use log::debug;

use crate::scene_graph::Node;

/// Default height of a model on stage, in scene units.
pub const CANONICAL_HEIGHT: f32 = 1.8;

/// Outcome of [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeReport {
    pub scale_factor: f32,
    pub translation: Vec3,
    /// The model had no usable height and kept unit scale.
    pub degenerate: bool,
}

/// Scale mapping `height` onto `canonical_height`, or `1.0` when that is not
/// a finite positive number.
pub fn scale_factor(canonical_height: f32, height: f32) -> f32 {
    usable_scale(canonical_height, height).unwrap_or(1.0)
}

fn usable_scale(canonical_height: f32, height: f32) -> Option<f32> {
    if !(height.is_finite() && height > 0.0) {
        return None;
    }
    let factor = canonical_height / height;
    (factor.is_finite() && factor > 0.0).then_some(factor)
}

/// Scales and recentres `root` in place so the model is `canonical_height`
/// tall, centred on X/Z and standing on `y = 0`.
///
/// The root transform is owned by the normalizer afterwards: its rotation is
/// reset and scale/translation are overwritten. Nothing non-finite is ever
/// written, whatever the geometry contains.
pub fn normalize(root: &mut Node, canonical_height: f32) -> NormalizeReport {
    let bounds = root.local_bounds();
    let height = bounds.map(|bounds| bounds.height()).unwrap_or(0.0);
    let usable = usable_scale(canonical_height, height);
    let degenerate = usable.is_none();
    let factor = usable.unwrap_or(1.0);

    let translation = bounds
        .map(|bounds| {
            let center = bounds.center();
            Vec3::new(-center.x, -bounds.min.y, -center.z) * factor
        })
        .filter(|translation| translation.is_finite())
        .unwrap_or(Vec3::ZERO);

    if degenerate {
        debug!(
            "model {} has degenerate bounds (height {height}); keeping unit scale",
            root.name
        );
    }

    root.transform.rotation = Quat::IDENTITY;
    root.transform.scale = Vec3::splat(factor);
    root.transform.translation = translation;

    NormalizeReport {
        scale_factor: factor,
        translation,
        degenerate,
    }
}
