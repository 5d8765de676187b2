//! Environment inputs consumed by the growth step.
//!
//! Soil and illumination live outside the core; the growth engine only ever
//! sees plain numbers sampled through these traits.

use glam::Vec3;

/// Scalar water/nutrient availability by world position.
pub trait SoilField: Send + Sync {
    fn water(&self, position: Vec3) -> f32;
}

/// Per-position light estimate.
pub trait LightField: Send + Sync {
    fn sample(&self, position: Vec3) -> LightSample;
}

#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Direction toward the dominant light source.
    pub direction: Vec3,
    pub intensity: f32,
}

/// Homogeneous soil.
#[derive(Debug, Clone, Copy)]
pub struct UniformSoil {
    pub water: f32,
}

impl SoilField for UniformSoil {
    fn water(&self, _position: Vec3) -> f32 {
        self.water
    }
}

/// A single distant light, the same everywhere.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::Y,
            intensity: 1.0,
        }
    }
}

impl LightField for DirectionalLight {
    fn sample(&self, _position: Vec3) -> LightSample {
        LightSample {
            direction: self.direction,
            intensity: self.intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_soil_ignores_position() {
        let soil = UniformSoil { water: 0.7 };
        assert_eq!(soil.water(Vec3::ZERO), 0.7);
        assert_eq!(soil.water(Vec3::new(10.0, -3.0, 2.0)), 0.7);
    }

    #[test]
    fn directional_light_is_position_independent() {
        let light = DirectionalLight::default();
        let sample = light.sample(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(sample.direction, Vec3::Y);
        assert_eq!(sample.intensity, 1.0);
    }
}
