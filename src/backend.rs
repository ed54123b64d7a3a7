use rayon::prelude::*;

use crate::{CameraControlInfo, CameraRig, RangeLimits};

/// Normalized linear depth of one camera, `0` at the eye and `1` at the far plane
#[derive(Debug, Clone, Copy)]
pub struct DepthImage<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [f32],
}

/// Turns a rendered depth image into ranges along each beam.
///
/// One implementation per rendering backend. `ranges` has `width * height` elements, row major.
pub trait DepthToRangeConverter: Send + Sync {
    fn convert(&self, depth: DepthImage<'_>, ranges: &mut [f32]);
}

/// Renders the rig's cameras and moves their results back to the host
pub trait RenderBackend: Send {
    /// Renders `camera` (rotated about the vertical axis) into `depth`, sized
    /// `rig.texels_per_camera()`.
    fn render_depth(
        &mut self,
        camera: &CameraControlInfo,
        depth: &mut [f32],
    ) -> Result<(), RenderError>;

    /// Starts the transfer of the device range buffer.
    ///
    /// `on_complete` must be called exactly once, from any thread, possibly after this
    /// function has returned.
    fn read_back(&mut self, device_ranges: &[f32], on_complete: ReadbackCallback);
}

pub type ReadbackCallback = Box<dyn FnOnce(Result<ReadbackData, ReadbackError>) + Send + 'static>;

/// Raw bytes as delivered by a GPU readback
#[derive(Debug, Clone, Default)]
pub struct ReadbackData {
    pub bytes: Vec<u8>,
    /// False if the transfer finished without delivering all data
    pub done: bool,
}

impl ReadbackData {
    pub fn from_ranges(ranges: &[f32]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(ranges).to_vec(),
            done: true,
        }
    }

    /// Reinterprets the payload as `f32` ranges
    pub fn ranges(&self, expected: usize) -> Result<Vec<f32>, ReadbackError> {
        if !self.done {
            return Err(ReadbackError::Incomplete);
        }
        let expected_bytes = expected * std::mem::size_of::<f32>();
        if self.bytes.len() != expected_bytes {
            return Err(ReadbackError::SizeMismatch {
                expected: expected_bytes,
                actual: self.bytes.len(),
            });
        }
        Ok(bytemuck::pod_collect_to_vec(&self.bytes))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReadbackError {
    #[error("Failed to read back GPU buffer: {0}")]
    Transfer(String),
    #[error("GPU readback incomplete")]
    Incomplete,
    #[error("Expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(thiserror::Error, Debug)]
#[error("Rendering camera {camera} failed: {reason}")]
pub struct RenderError {
    pub camera: usize,
    pub reason: String,
}

/// Linear depth to range, the reference implementation run on the CPU.
///
/// Beams are spaced by the scan's angle step, the depth image is a perspective projection,
/// so each beam samples the texel its direction projects to and scales the depth by the
/// length of that texel's ray.
#[derive(Debug, Clone)]
pub struct LinearDepthConverter {
    step_h: f64,
    step_v: f64,
    half_hfov: f64,
    half_vfov: f64,
    range: RangeLimits,
}

impl LinearDepthConverter {
    pub fn new(rig: &CameraRig) -> Self {
        let geometry = rig.geometry();
        Self {
            step_h: geometry.horizontal.angle_step,
            step_v: geometry.vertical.angle_step,
            half_hfov: rig.hfov() * 0.5,
            half_vfov: rig.vfov() * 0.5,
            range: geometry.range,
        }
    }

    fn texel(&self, angle_deg: f64, half_fov_deg: f64, len: usize) -> usize {
        let tan_half = half_fov_deg.to_radians().tan();
        if len <= 1 || tan_half <= 0. {
            return 0;
        }
        let pos = (len as f64 * 0.5) * (1. + angle_deg.to_radians().tan() / tan_half);
        (pos.floor().max(0.) as usize).min(len - 1)
    }

    fn resolve(&self, depth: &DepthImage<'_>, x: usize, y: usize) -> f32 {
        let angle_h = self.step_h * x as f64 - self.half_hfov;
        let angle_v = if depth.height > 1 {
            self.step_v * y as f64 - self.half_vfov
        } else {
            0.
        };

        let tx = self.texel(angle_h, self.half_hfov, depth.width);
        let ty = self.texel(angle_v, self.half_vfov, depth.height);
        let Some(&d) = depth.data.get(ty * depth.width + tx) else {
            return f32::NAN;
        };

        let (tan_h, tan_v) = (angle_h.to_radians().tan(), angle_v.to_radians().tan());
        let normalized = d as f64 * (1. + tan_h * tan_h + tan_v * tan_v).sqrt();

        if normalized >= 1. {
            f32::INFINITY
        } else {
            let range = normalized * self.range.max;
            if range < self.range.min {
                f32::NAN
            } else {
                range as f32
            }
        }
    }
}

impl DepthToRangeConverter for LinearDepthConverter {
    fn convert(&self, depth: DepthImage<'_>, ranges: &mut [f32]) {
        if depth.width == 0 {
            return;
        }
        ranges
            .par_chunks_mut(depth.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, range) in row.iter_mut().enumerate() {
                    *range = self.resolve(&depth, x, y);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{config::tests::planar_config, ValidLidarConfig};

    fn planar_rig() -> CameraRig {
        let config = ValidLidarConfig::try_from(planar_config(360, -180., 180.)).unwrap();
        CameraRig::new(&config.geometry)
    }

    #[test]
    fn center_beam_is_depth_times_far() {
        let rig = planar_rig();
        let converter = LinearDepthConverter::new(&rig);
        let depth = vec![0.2f32; rig.texels_per_camera()];
        let mut ranges = vec![0f32; rig.texels_per_camera()];
        converter.convert(
            DepthImage {
                width: rig.width(),
                height: rig.height(),
                data: &depth,
            },
            &mut ranges,
        );
        assert_relative_eq!(6., ranges[45], epsilon = 1e-4);
        // Off-axis beams travel further to the same depth plane
        assert!(ranges[0] > ranges[45]);
    }

    #[test]
    fn far_plane_is_no_hit_and_near_is_nan() {
        let rig = planar_rig();
        let converter = LinearDepthConverter::new(&rig);
        let mut ranges = vec![0f32; rig.texels_per_camera()];

        let far = vec![1f32; rig.texels_per_camera()];
        converter.convert(
            DepthImage {
                width: rig.width(),
                height: rig.height(),
                data: &far,
            },
            &mut ranges,
        );
        assert!(ranges.iter().all(|r| r.is_infinite()));

        let near = vec![0.001f32; rig.texels_per_camera()];
        converter.convert(
            DepthImage {
                width: rig.width(),
                height: rig.height(),
                data: &near,
            },
            &mut ranges,
        );
        assert!(ranges[45].is_nan());
    }

    #[test]
    fn readback_payload_round_trips() {
        let data = ReadbackData::from_ranges(&[1., 2.5, f32::INFINITY]);
        assert_eq!(vec![1., 2.5, f32::INFINITY], data.ranges(3).unwrap());
        assert!(matches!(
            data.ranges(4),
            Err(ReadbackError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn incomplete_readback_is_error() {
        let data = ReadbackData {
            done: false,
            ..ReadbackData::from_ranges(&[1.])
        };
        assert!(matches!(data.ranges(1), Err(ReadbackError::Incomplete)));
    }
}
