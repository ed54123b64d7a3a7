use std::{borrow::Cow, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::InvalidConfig;

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Default)]
#[non_exhaustive]
pub enum NoiseType {
    #[default]
    None,
    Gaussian,
    /// Kept for older descriptions, behaves like [`NoiseType::Gaussian`] with quantization
    GaussianQuantized,
    Custom,
}

impl Serialize for NoiseType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match self {
            NoiseType::None => "none",
            NoiseType::Gaussian => "gaussian",
            NoiseType::GaussianQuantized => "gaussian_quantized",
            NoiseType::Custom => "custom",
        })
    }
}

impl<'de> Deserialize<'de> for NoiseType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let x = Cow::<str>::deserialize(deserializer)?;
        Self::from_str(&x).map_err(<D::Error as serde::de::Error>::custom)
    }
}

impl FromStr for NoiseType {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "gaussian" => Ok(Self::Gaussian),
            "gaussian_quantized" => Ok(Self::GaussianQuantized),
            "custom" => Ok(Self::Custom),
            s => Err(InvalidConfig::new(format!(
                "Can't parse '{}' into NoiseType",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NoiseConfig {
    #[serde(rename = "type")]
    pub noise_type: NoiseType,
    pub mean: f64,
    pub stddev: f64,
    pub bias_mean: f64,
    pub bias_stddev: f64,
    pub dynamic_bias_stddev: f64,
    pub dynamic_bias_correlation_time: f64,
    /// Quantization step, 0 disables quantization
    pub precision: f64,
    /// RNG seed, 0 draws one from the OS
    pub seed: u64,
}

impl NoiseConfig {
    pub fn gaussian(mean: f64, stddev: f64) -> Self {
        Self {
            noise_type: NoiseType::Gaussian,
            mean,
            stddev,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidConfig> {
        let non_negative = [
            ("stddev", self.stddev),
            ("bias_stddev", self.bias_stddev),
            ("dynamic_bias_stddev", self.dynamic_bias_stddev),
            ("dynamic_bias_correlation_time", self.dynamic_bias_correlation_time),
            ("precision", self.precision),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0. {
                return Err(InvalidConfig::new(format!(
                    "Noise {name} cannot be less than 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}
