use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Error, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::StageConfig;

/// Per-entity accent color, stored as 8-bit sRGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThemeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ThemeColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(value: &str) -> Result<Self> {
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(anyhow!("expected a #RRGGBB color, found `{value}`"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .with_context(|| format!("invalid hex digits in color `{value}`"))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channels normalized to `0..=1`.
    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    /// `"r, g, b"` form used by panel stylesheets for `rgba(...)` mixing.
    pub fn css_rgb(&self) -> String {
        format!("{}, {}, {}", self.r, self.g, self.b)
    }
}

impl FromStr for ThemeColor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl TryFrom<String> for ThemeColor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<ThemeColor> for String {
    fn from(color: ThemeColor) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Colored point light beside the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccentLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

/// Glowing ring around the platform edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformRing {
    pub radius: f32,
    pub tube: f32,
    pub color: Vec3,
}

/// Shared material of the ambient particle field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleMaterial {
    pub size: f32,
    pub color: Vec3,
    pub opacity: f32,
    pub additive: bool,
}

/// Sole owner and writer of the theme-tinted stage elements.
#[derive(Debug, Clone)]
pub struct ThemeSynchronizer {
    accent: AccentLight,
    ring: PlatformRing,
    particles: ParticleMaterial,
    current: ThemeColor,
}

impl ThemeSynchronizer {
    pub fn new(config: &StageConfig) -> Self {
        let initial = config.default_theme;
        let color = initial.to_vec3();
        Self {
            accent: AccentLight {
                position: Vec3::new(2.0, 2.0, 2.0),
                color,
                intensity: config.accent_intensity,
                range: config.accent_range,
            },
            ring: PlatformRing {
                radius: 1.2,
                tube: 0.02,
                color,
            },
            particles: ParticleMaterial {
                size: config.particles.size,
                color,
                opacity: config.particles.opacity,
                additive: true,
            },
            current: initial,
        }
    }

    /// Tints the accent light, the ring and the particles.
    pub fn apply_theme(&mut self, theme: ThemeColor) {
        let color = theme.to_vec3();
        self.accent.color = color;
        self.ring.color = color;
        self.particles.color = color;
        self.current = theme;
    }

    pub fn current(&self) -> ThemeColor {
        self.current
    }

    pub fn accent_light(&self) -> &AccentLight {
        &self.accent
    }

    pub fn ring(&self) -> &PlatformRing {
        &self.ring
    }

    pub fn particle_material(&self) -> &ParticleMaterial {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_and_without_hash() {
        assert_eq!(
            ThemeColor::from_hex("#4A9EFF").unwrap(),
            ThemeColor::new(0x4A, 0x9E, 0xFF)
        );
        assert_eq!(
            "76b900".parse::<ThemeColor>().unwrap(),
            ThemeColor::new(0x76, 0xB9, 0x00)
        );
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(ThemeColor::from_hex("#FFF").is_err());
        assert!(ThemeColor::from_hex("#GG0000").is_err());
        assert!(ThemeColor::from_hex("#ÿÿÿ").is_err());
    }

    #[test]
    fn css_rgb_lists_channels() {
        assert_eq!(ThemeColor::new(255, 51, 51).css_rgb(), "255, 51, 51");
    }

    #[test]
    fn serde_uses_hex_strings() {
        let color = ThemeColor::new(0xFF, 0xB8, 0x00);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"#FFB800\"");
        let back: ThemeColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
    }

    #[test]
    fn apply_theme_tints_all_three_elements() {
        let mut theme = ThemeSynchronizer::new(&StageConfig::default());
        let red = ThemeColor::new(255, 0, 0);
        theme.apply_theme(red);
        assert_eq!(theme.accent_light().color, Vec3::X);
        assert_eq!(theme.ring().color, Vec3::X);
        assert_eq!(theme.particle_material().color, Vec3::X);
        assert_eq!(theme.current(), red);
    }
}
