use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::{CameraRig, Pose, ReadbackError};

/// Number of frames that can be in flight between capture and stitching
pub const FRAME_POOL_SIZE: usize = 5;

/// Raw per camera ranges of one capture cycle
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    slot: usize,
    /// Simulation time the cameras were rendered at
    pub capture_time: f64,
    pub pose: Pose,
    /// Simulation time between capture and readback completion
    pub latency: f64,
    /// Start/stop cycle of the sensor the capture belongs to
    pub generation: u64,
    cameras: Box<[Vec<f32>]>,
}

impl CapturedFrame {
    fn new(slot: usize, rig: &CameraRig) -> Self {
        let cameras = rig
            .cameras()
            .iter()
            .map(|c| {
                if c.overlaps {
                    vec![f32::NAN; rig.texels_per_camera()]
                } else {
                    Vec::new()
                }
            })
            .collect();
        Self {
            slot,
            capture_time: 0.,
            pose: Pose::default(),
            latency: 0.,
            generation: 0,
            cameras,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Range buffer of a camera, empty if the camera doesn't overlap the scan window
    pub fn camera(&self, index: usize) -> &[f32] {
        self.cameras.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn camera_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.cameras.get_mut(index).map(Vec::as_mut_slice)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Copies the overlapping cameras out of the device range buffer, which holds
    /// `texels_per_camera` ranges for every camera in index order.
    pub fn store(
        &mut self,
        device_ranges: &[f32],
        texels_per_camera: usize,
    ) -> Result<(), ReadbackError> {
        let expected = texels_per_camera * self.cameras.len();
        if texels_per_camera == 0 || device_ranges.len() != expected {
            return Err(ReadbackError::SizeMismatch {
                expected: expected * std::mem::size_of::<f32>(),
                actual: std::mem::size_of_val(device_ranges),
            });
        }
        for (dst, src) in self
            .cameras
            .iter_mut()
            .zip(device_ranges.chunks_exact(texels_per_camera))
        {
            if dst.len() == src.len() {
                dst.copy_from_slice(src);
            }
        }
        Ok(())
    }
}

/// Fixed pool of frames plus the FIFO handing finished captures to the stitcher.
///
/// A frame is owned by exactly one party at a time: the pool, the capture in flight, the
/// queue or the stitcher. Handles are cheap to clone and share the same pool.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    free_tx: Sender<CapturedFrame>,
    free_rx: Receiver<CapturedFrame>,
    ready_tx: Sender<CapturedFrame>,
    ready_rx: Receiver<CapturedFrame>,
}

impl FrameBuffer {
    pub fn new(rig: &CameraRig) -> Self {
        let (free_tx, free_rx) = bounded(FRAME_POOL_SIZE);
        let (ready_tx, ready_rx) = bounded(FRAME_POOL_SIZE);
        for slot in 0..FRAME_POOL_SIZE {
            // Capacity equals pool size
            let _ = free_tx.try_send(CapturedFrame::new(slot, rig));
        }
        Self {
            free_tx,
            free_rx,
            ready_tx,
            ready_rx,
        }
    }

    /// Next free frame in slot order, `None` if all are in flight
    pub fn try_acquire(&self) -> Option<CapturedFrame> {
        self.free_rx.try_recv().ok()
    }

    /// Returns a frame to the pool
    pub fn release(&self, frame: CapturedFrame) {
        if let Err(e) = self.free_tx.try_send(frame) {
            log::error!("Frame slot {} couldn't be returned to the pool", e.into_inner().slot);
        }
    }

    /// Queues a finished capture. Gives the frame back if the queue doesn't accept it.
    pub fn push(&self, frame: CapturedFrame) -> Result<(), CapturedFrame> {
        self.ready_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(f) | TrySendError::Disconnected(f) => f,
        })
    }

    pub fn receiver(&self) -> Receiver<CapturedFrame> {
        self.ready_rx.clone()
    }

    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    pub fn pending(&self) -> usize {
        self.ready_rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::tests::planar_config, ValidLidarConfig};

    fn rig() -> CameraRig {
        let mut rig = CameraRig::new(
            &ValidLidarConfig::try_from(planar_config(360, -180., 180.))
                .unwrap()
                .geometry,
        );
        rig.set_overlap(2, false);
        rig
    }

    #[test]
    fn slots_are_handed_out_in_order() {
        let pool = FrameBuffer::new(&rig());
        let frames = (0..FRAME_POOL_SIZE)
            .map(|_| pool.try_acquire().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec![0, 1, 2, 3, 4], frames.iter().map(|f| f.slot()).collect::<Vec<_>>());
        assert!(pool.try_acquire().is_none());

        for f in frames.into_iter().rev().take(2) {
            pool.release(f);
        }
        assert_eq!(4, pool.try_acquire().unwrap().slot());
        assert_eq!(3, pool.try_acquire().unwrap().slot());
    }

    #[test]
    fn queued_frames_are_fifo() {
        let pool = FrameBuffer::new(&rig());
        let mut a = pool.try_acquire().unwrap();
        let mut b = pool.try_acquire().unwrap();
        a.capture_time = 1.;
        b.capture_time = 2.;
        pool.push(a).unwrap();
        pool.push(b).unwrap();
        let rx = pool.receiver();
        assert_eq!(1., rx.recv().unwrap().capture_time);
        assert_eq!(2., rx.recv().unwrap().capture_time);
    }

    #[test]
    fn non_overlapping_camera_has_no_buffer() {
        let rig = rig();
        let mut frame = FrameBuffer::new(&rig).try_acquire().unwrap();
        let device = (0..rig.camera_count() * rig.texels_per_camera())
            .map(|i| i as f32)
            .collect::<Vec<_>>();
        frame.store(&device, rig.texels_per_camera()).unwrap();
        assert_eq!(&device[90..180], frame.camera(1));
        assert!(frame.camera(2).is_empty());
        assert!(frame.camera(9).is_empty());
        assert!(frame.store(&device[1..], rig.texels_per_camera()).is_err());
    }
}
