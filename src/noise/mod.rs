use std::sync::Arc;

use crate::{NoiseConfig, NoiseType, RangeLimits};

mod custom;
mod gaussian;

pub use custom::*;
pub use gaussian::*;

/// Beams handled by one RNG stream when noise is applied in parallel
pub const NOISE_CHUNK: usize = 256;

/// User supplied per beam noise, called as `f(range, dt)`
pub type CustomNoiseFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Perturbs a scan's ranges in place.
///
/// `dt` is the simulation time since the previous evaluation. NaN beams stay NaN and every
/// other output lies within the sensor's range limits.
pub trait NoiseModel: Send {
    fn apply(&mut self, ranges: &mut [f64], dt: f64);
}

/// Builds the model named by `config`. `custom` is required for [`NoiseType::Custom`].
pub fn noise_model_from_config(
    config: &NoiseConfig,
    limits: &RangeLimits,
    custom: Option<CustomNoiseFn>,
) -> Option<Box<dyn NoiseModel>> {
    match config.noise_type {
        NoiseType::None => None,
        NoiseType::Gaussian | NoiseType::GaussianQuantized => {
            Some(Box::new(GaussianNoiseModel::new(config, limits)))
        }
        NoiseType::Custom => match custom {
            Some(f) => Some(Box::new(CustomNoiseModel::new(f, limits))),
            None => {
                log::warn!("Custom noise configured without a noise function, noise disabled");
                None
            }
        },
    }
}

fn clamp(value: f64, limits: &RangeLimits) -> f64 {
    if value.is_nan() {
        value
    } else {
        value.clamp(limits.min, limits.max)
    }
}
