use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalize::CANONICAL_HEIGHT;
use crate::theme::ThemeColor;

/// Tunables for the stage presentation. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Height every displayed model is scaled to, in scene units.
    pub canonical_height: f32,
    /// Model turntable speed in radians per second.
    pub spin_speed: f32,
    pub accent_intensity: f32,
    pub accent_range: f32,
    /// Theme shown before the first selection.
    pub default_theme: ThemeColor,
    pub particles: ParticleConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            canonical_height: CANONICAL_HEIGHT,
            spin_speed: 0.3,
            accent_intensity: 5.0,
            accent_range: 10.0,
            default_theme: ThemeColor::new(0x4A, 0x9E, 0xFF),
            particles: ParticleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    /// Edge length of the cube the particles start in.
    pub spread: f32,
    /// Upward drift in units per second.
    pub rise_speed: f32,
    /// Particles above this height wrap to `floor`.
    pub ceiling: f32,
    pub floor: f32,
    /// Field rotation around Y in radians per second.
    pub field_spin: f32,
    pub size: f32,
    pub opacity: f32,
    pub seed: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 100,
            spread: 3.0,
            rise_speed: 0.6,
            ceiling: 2.0,
            floor: -0.5,
            field_spin: -0.12,
            size: 0.03,
            opacity: 0.8,
            seed: 0x5EED,
        }
    }
}

impl StageConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid stage config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("unable to read stage config {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if !(self.canonical_height.is_finite() && self.canonical_height > 0.0) {
            return Err(anyhow!(
                "canonical_height must be a positive number, found {}",
                self.canonical_height
            ));
        }
        if !self.spin_speed.is_finite() {
            return Err(anyhow!("spin_speed must be finite"));
        }
        let particles = &self.particles;
        if particles.ceiling <= particles.floor {
            return Err(anyhow!(
                "particle ceiling ({}) must be above floor ({})",
                particles.ceiling,
                particles.floor
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = StageConfig::from_json_str(r#"{ "spin_speed": 1.0 }"#).unwrap();
        assert_eq!(config.spin_speed, 1.0);
        assert_eq!(config.canonical_height, CANONICAL_HEIGHT);
        assert_eq!(config.particles.count, 100);
    }

    #[test]
    fn nested_particle_fields_merge() {
        let config =
            StageConfig::from_json_str(r#"{ "particles": { "count": 8, "seed": 7 } }"#).unwrap();
        assert_eq!(config.particles.count, 8);
        assert_eq!(config.particles.seed, 7);
        assert_eq!(config.particles.ceiling, 2.0);
    }

    #[test]
    fn rejects_non_positive_canonical_height() {
        assert!(StageConfig::from_json_str(r#"{ "canonical_height": 0.0 }"#).is_err());
        assert!(StageConfig::from_json_str(r#"{ "canonical_height": -2.0 }"#).is_err());
    }

    #[test]
    fn rejects_inverted_particle_bounds() {
        let json = r#"{ "particles": { "ceiling": -1.0, "floor": 1.0 } }"#;
        assert!(StageConfig::from_json_str(json).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r##"{{ "default_theme": "#FF3333" }}"##).unwrap();
        let config = StageConfig::load(file.path()).unwrap();
        assert_eq!(config.default_theme, ThemeColor::new(0xFF, 0x33, 0x33));
    }
}
