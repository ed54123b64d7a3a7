use rayon::prelude::*;

use super::{clamp, CustomNoiseFn, NoiseModel};
use crate::RangeLimits;

pub struct CustomNoiseModel {
    f: CustomNoiseFn,
    limits: RangeLimits,
}

impl CustomNoiseModel {
    pub fn new(f: CustomNoiseFn, limits: &RangeLimits) -> Self {
        Self { f, limits: *limits }
    }
}

impl NoiseModel for CustomNoiseModel {
    fn apply(&mut self, ranges: &mut [f64], dt: f64) {
        let (f, limits) = (&self.f, &self.limits);
        ranges.par_iter_mut().for_each(|r| {
            if !r.is_nan() {
                *r = clamp(f(*r, dt), limits);
            }
        });
    }
}
