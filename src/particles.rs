use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ParticleConfig;

/// Ambient motes drifting upwards around the platform.
///
/// Positions live in field space; the whole field turns around Y by
/// [`rotation_y`](Self::rotation_y).
#[derive(Debug, Clone)]
pub struct ParticleField {
    positions: Vec<Vec3>,
    rotation_y: f32,
    rise_speed: f32,
    ceiling: f32,
    floor: f32,
    field_spin: f32,
}

impl ParticleField {
    pub fn new(config: &ParticleConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let spread = config.spread;
        let positions = (0..config.count)
            .map(|_| {
                Vec3::new(
                    (rng.gen::<f32>() - 0.5) * spread,
                    (rng.gen::<f32>() - 0.5) * spread,
                    (rng.gen::<f32>() - 0.5) * spread,
                )
            })
            .collect();
        Self {
            positions,
            rotation_y: 0.0,
            rise_speed: config.rise_speed,
            ceiling: config.ceiling,
            floor: config.floor,
            field_spin: config.field_spin,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    pub fn advance(&mut self, delta: f32) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        let rise = self.rise_speed * delta;
        for position in &mut self.positions {
            position.y += rise;
            if position.y > self.ceiling {
                position.y = self.floor;
            }
        }
        self.rotation_y += self.field_spin * delta;
    }
}
