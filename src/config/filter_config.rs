use serde::{Deserialize, Serialize};

use crate::InvalidConfig;

/// Post-stitch masks. Horizontal angles in degrees, ranges in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub angle: Option<FilterWindow>,
    pub range: Option<FilterWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterWindow {
    pub lower: f64,
    pub upper: f64,
}

impl FilterWindow {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.angle.is_none() && self.range.is_none()
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidConfig> {
        for (name, window) in [("angle", self.angle), ("range", self.range)] {
            if let Some(w) = window {
                if w.lower.is_nan() || w.upper.is_nan() || w.lower > w.upper {
                    return Err(InvalidConfig::new(format!(
                        "Invalid {name} filter [{}, {}]",
                        w.lower, w.upper
                    )));
                }
            }
        }
        Ok(())
    }
}
