use std::ops::Deref;

use serde::{Deserialize, Serialize};

mod filter_config;
mod noise_config;
mod range_config;
mod scan_axis;

pub use filter_config::*;
pub use noise_config::*;
pub use range_config::*;
pub use scan_axis::*;

/// Default number of finished scans kept for the transmit path
pub const DEFAULT_OUTPUT_CAPACITY: usize = 3;

/// Sensor description as delivered by the loader. Values are not checked for consistency,
/// see [`ValidLidarConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarConfig {
    pub name: String,
    /// Scans per second of simulation time
    pub update_rate: f64,
    pub horizontal: ScanAxisConfig,
    #[serde(default = "ScanAxisConfig::single_row")]
    pub vertical: ScanAxisConfig,
    pub range: RangeConfig,
    #[serde(default)]
    pub noise: Option<NoiseConfig>,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

fn default_output_capacity() -> usize {
    DEFAULT_OUTPUT_CAPACITY
}

/// Mustn't contain contradicting information (e.g. range_min > range_max or zero samples)
#[derive(Debug, Clone)]
pub struct ValidLidarConfig {
    pub name: String,
    pub update_rate: f64,
    pub noise: Option<NoiseConfig>,
    pub filter: FilterConfig,
    pub output_capacity: usize,
    pub geometry: ScanGeometry,
}

impl Deref for ValidLidarConfig {
    type Target = ScanGeometry;

    fn deref(&self) -> &Self::Target {
        &self.geometry
    }
}

impl ValidLidarConfig {
    /// Update period in seconds of simulation time
    pub fn update_period(&self) -> f64 {
        1. / self.update_rate
    }
}

/// Beam layout of a scan, fixed for the sensor lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct ScanGeometry {
    pub horizontal: ScanAxis,
    pub vertical: ScanAxis,
    pub range: RangeLimits,
}

impl ScanGeometry {
    pub fn total_samples(&self) -> usize {
        self.horizontal.samples as usize * self.vertical.samples as usize
    }

    /// Nearest horizontal beam to `angle_deg`, accepting angles shifted by whole turns.
    ///
    /// Returns `None` if the angle doesn't fall into the horizontal window.
    pub fn horizontal_index(&self, angle_deg: f64) -> Option<usize> {
        let axis = &self.horizontal;
        let wrapped = axis.angle.min + (angle_deg - axis.angle.min).rem_euclid(360.);
        if wrapped - axis.angle.max > ANGLE_EPSILON {
            return None;
        }
        let samples = axis.samples as usize;
        let index = axis.beam_offset(wrapped).round() as usize;
        if axis.angle.spans_full_turn() {
            Some(index % samples)
        } else {
            Some(index.min(samples - 1))
        }
    }
}

impl TryFrom<LidarConfig> for ValidLidarConfig {
    type Error = InvalidConfig;

    fn try_from(value: LidarConfig) -> Result<Self, Self::Error> {
        if value.update_rate.is_nan() || value.update_rate <= 0. {
            return Err(InvalidConfig::new(format!(
                "Expected update_rate to be positive, got {}",
                value.update_rate
            )));
        }
        if value.output_capacity == 0 {
            return Err(InvalidConfig::new("output_capacity must be at least 1"));
        }
        if let Some(noise) = &value.noise {
            noise.validate()?;
        }
        value.filter.validate()?;

        let geometry = ScanGeometry {
            horizontal: value.horizontal.try_into()?,
            vertical: value.vertical.try_into()?,
            range: value.range.try_into()?,
        };

        Ok(Self {
            name: value.name,
            update_rate: value.update_rate,
            noise: value.noise,
            filter: value.filter,
            output_capacity: value.output_capacity,
            geometry,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct InvalidConfig {
    reason: String,
}

impl InvalidConfig {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
