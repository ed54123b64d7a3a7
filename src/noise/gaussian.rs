use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use super::{clamp, NoiseModel, NOISE_CHUNK};
use crate::{NoiseConfig, NoiseType, RangeLimits};

const PRECISION_EPSILON: f64 = 1e-6;

/// White noise plus a bias that optionally drifts as a first order Gauss-Markov process
pub struct GaussianNoiseModel {
    params: WhiteNoise,
    dynamic_bias_stddev: f64,
    correlation_time: f64,
    bias: f64,
    rng: SmallRng,
}

/// Everything a single beam needs, copied into the parallel workers
#[derive(Debug, Clone, Copy)]
struct WhiteNoise {
    mean: f64,
    stddev: f64,
    precision: Option<f64>,
    limits: RangeLimits,
}

impl WhiteNoise {
    fn perturb(&self, value: f64, bias: f64, rng: &mut SmallRng) -> f64 {
        if value.is_nan() {
            return value;
        }
        let white = self.mean + self.stddev * rng.sample::<f64, _>(StandardNormal);
        let mut output = value + bias + white;
        if let Some(precision) = self.precision {
            output = (output / precision).round() * precision;
        }
        clamp(output, &self.limits)
    }
}

impl GaussianNoiseModel {
    pub fn new(config: &NoiseConfig, limits: &RangeLimits) -> Self {
        let mut rng = if config.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(config.seed)
        };

        let mut bias =
            config.bias_mean + config.bias_stddev * rng.sample::<f64, _>(StandardNormal);
        if rng.gen_bool(0.5) {
            bias = -bias;
        }

        let quantized = config.noise_type == NoiseType::GaussianQuantized;
        let precision =
            (quantized && config.precision > PRECISION_EPSILON).then_some(config.precision);
        if let Some(p) = precision {
            log::debug!("Noise quantized, precision={p}");
        }

        Self {
            params: WhiteNoise {
                mean: config.mean,
                stddev: config.stddev,
                precision,
                limits: *limits,
            },
            dynamic_bias_stddev: config.dynamic_bias_stddev,
            correlation_time: config.dynamic_bias_correlation_time,
            bias,
            rng,
        }
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    fn update_bias(&mut self, dt: f64) {
        if self.dynamic_bias_stddev <= 0. || self.correlation_time <= 0. || dt <= 0. {
            return;
        }
        let (sigma_b, tau) = (self.dynamic_bias_stddev, self.correlation_time);
        let sigma_d = (-sigma_b * sigma_b * tau / 2. * (-2. * dt / tau).exp_m1()).sqrt();
        let phi = (-dt / tau).exp();
        self.bias = phi * self.bias + sigma_d * self.rng.sample::<f64, _>(StandardNormal);
    }
}

impl NoiseModel for GaussianNoiseModel {
    fn apply(&mut self, ranges: &mut [f64], dt: f64) {
        self.update_bias(dt);

        let seeds = (0..ranges.len().div_ceil(NOISE_CHUNK))
            .map(|_| self.rng.gen::<u64>())
            .collect::<Vec<_>>();
        let (params, bias) = (self.params, self.bias);

        ranges
            .par_chunks_mut(NOISE_CHUNK)
            .zip(seeds.par_iter())
            .for_each(|(chunk, seed)| {
                let mut rng = SmallRng::seed_from_u64(*seed);
                for r in chunk {
                    *r = params.perturb(*r, bias, &mut rng);
                }
            });
    }
}
