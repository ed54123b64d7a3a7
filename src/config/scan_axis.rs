use serde::{Deserialize, Serialize};

use crate::InvalidConfig;

pub(crate) const ANGLE_EPSILON: f64 = 1e-6;
const FULL_TURN_DEG: f64 = 360.;

/// One scan axis as described, angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanAxisConfig {
    pub samples: u32,
    #[serde(default)]
    pub angle_min: f64,
    #[serde(default)]
    pub angle_max: f64,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
}

fn default_resolution() -> f64 {
    1.
}

impl ScanAxisConfig {
    /// Vertical axis of a planar scanner
    pub fn single_row() -> Self {
        Self {
            samples: 1,
            angle_min: 0.,
            angle_max: 0.,
            resolution: 1.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn spans_full_turn(&self) -> bool {
        (self.range() - FULL_TURN_DEG).abs() < ANGLE_EPSILON
    }
}

/// Validated axis: `angle_step` is derived once and never changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanAxis {
    pub samples: u32,
    pub resolution: f64,
    pub angle: AngleRange,
    pub angle_step: f64,
}

impl ScanAxis {
    pub fn new(samples: u32, angle_min: f64, angle_max: f64, resolution: f64) -> Self {
        let angle = AngleRange::new(angle_min, angle_max);

        // A full turn must not sample the same direction twice
        let residual = if angle.spans_full_turn() { 0. } else { 1. };
        let range_count = resolution * samples as f64 - residual;

        let angle_step = if angle.range() <= 0. || range_count <= 0. {
            1.
        } else {
            angle.range() / range_count
        };

        Self {
            samples,
            resolution,
            angle,
            angle_step,
        }
    }

    /// Fractional beams from the window start to `angle_deg`, not wrapped
    pub fn beam_offset(&self, angle_deg: f64) -> f64 {
        (angle_deg - self.angle.min) / self.angle_step
    }

    pub fn angle_min_rad(&self) -> f64 {
        self.angle.min.to_radians()
    }

    pub fn angle_max_rad(&self) -> f64 {
        self.angle.max.to_radians()
    }

    pub fn angle_step_rad(&self) -> f64 {
        self.angle_step.to_radians()
    }

    /// The extreme (min or max) with the larger magnitude
    pub fn dominant_extreme(&self) -> f64 {
        self.angle.min.abs().max(self.angle.max.abs())
    }
}

impl TryFrom<ScanAxisConfig> for ScanAxis {
    type Error = InvalidConfig;

    fn try_from(value: ScanAxisConfig) -> Result<Self, Self::Error> {
        if value.samples == 0 {
            return Err(InvalidConfig::new("Expected at least one sample per axis"));
        }
        if value.resolution.is_nan() || value.resolution <= 0. {
            return Err(InvalidConfig::new(format!(
                "Expected resolution to be positive, got {}",
                value.resolution
            )));
        }
        if value.angle_min < -FULL_TURN_DEG || value.angle_max > FULL_TURN_DEG {
            return Err(InvalidConfig::new(format!(
                "Axis window [{}, {}] exceeds one turn",
                value.angle_min, value.angle_max
            )));
        }
        if value.angle_max - value.angle_min > FULL_TURN_DEG + ANGLE_EPSILON {
            return Err(InvalidConfig::new(format!(
                "Axis window [{}, {}] is wider than 360 deg",
                value.angle_min, value.angle_max
            )));
        }
        Ok(Self::new(
            value.samples,
            value.angle_min,
            value.angle_max,
            value.resolution,
        ))
    }
}
