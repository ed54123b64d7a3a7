use serde::{Deserialize, Serialize};

use crate::InvalidConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub resolution: f64,
}

/// Near/far limits of a beam in meters, also the clip planes of the depth cameras
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeLimits {
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
}

impl RangeLimits {
    pub fn contains(&self, range: f64) -> bool {
        range >= self.min && range <= self.max
    }
}

impl TryFrom<RangeConfig> for RangeLimits {
    type Error = InvalidConfig;

    fn try_from(value: RangeConfig) -> Result<Self, Self::Error> {
        if value.min.is_nan() || value.min < 0. {
            return Err(InvalidConfig::new(format!(
                "Expected range min to be >= 0, got {}",
                value.min
            )));
        }
        if value.max.is_nan() || value.max <= value.min {
            return Err(InvalidConfig::new(format!(
                "Expected range max to exceed min ({}), got {}",
                value.min, value.max
            )));
        }
        Ok(Self {
            min: value.min,
            max: value.max,
            resolution: value.resolution,
        })
    }
}
