use serde::{Deserialize, Serialize};

use crate::ScanGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.,
            y: 0.,
            z: 0.,
            w: 1.,
        }
    }
}

/// World pose of the sensor at the render instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// Supplies the sensor's world pose, sampled on the render thread
pub trait PoseSource: Send {
    fn world_pose(&self) -> Pose;
}

impl PoseSource for Pose {
    fn world_pose(&self) -> Pose {
        *self
    }
}

/// One finished laser scan. Angles are radians, ranges meters.
///
/// Beams are stored row major: `index = horizontal + vertical * count`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMessage {
    pub frame: String,
    pub count: u32,
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_step: f64,
    pub vertical_count: u32,
    pub vertical_angle_min: f64,
    pub vertical_angle_max: f64,
    pub vertical_angle_step: f64,
    pub range_min: f64,
    pub range_max: f64,
    /// NaN means no return
    pub ranges: Vec<f64>,
    pub intensities: Vec<f64>,
    pub world_pose: Pose,
    /// Simulation time of the capture in seconds
    pub time: f64,
}

impl ScanMessage {
    pub fn new(frame: impl Into<String>, geometry: &ScanGeometry) -> Self {
        let total = geometry.total_samples();
        Self {
            frame: frame.into(),
            count: geometry.horizontal.samples,
            angle_min: geometry.horizontal.angle_min_rad(),
            angle_max: geometry.horizontal.angle_max_rad(),
            angle_step: geometry.horizontal.angle_step_rad(),
            vertical_count: geometry.vertical.samples,
            vertical_angle_min: geometry.vertical.angle_min_rad(),
            vertical_angle_max: geometry.vertical.angle_max_rad(),
            vertical_angle_step: geometry.vertical.angle_step_rad(),
            range_min: geometry.range.min,
            range_max: geometry.range.max,
            ranges: vec![f64::NAN; total],
            intensities: vec![0.; total],
            world_pose: Pose::default(),
            time: 0.,
        }
    }

    pub fn total_samples(&self) -> usize {
        self.count as usize * self.vertical_count as usize
    }

    pub fn reset_ranges(&mut self) {
        self.ranges.fill(f64::NAN);
    }

    pub fn returns(&self) -> usize {
        self.ranges.iter().filter(|r| !r.is_nan()).count()
    }
}
