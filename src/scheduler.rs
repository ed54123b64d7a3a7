use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use crate::{
    CameraRig, CapturedFrame, DepthImage, DepthToRangeConverter, FrameBuffer, LidarStats,
    PoseSource, ReadbackCallback, ReadbackData, ReadbackError, RenderBackend, SimClock,
};

/// Result of one [`CaptureScheduler::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Update period not yet elapsed
    Waiting,
    /// Sensor isn't running
    Stopped,
    /// Cameras rendered and readback requested
    Captured,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoFreeSlot,
    RenderFailed,
}

/// Producer side of the pipeline, driven by the render loop
pub struct CaptureScheduler<B> {
    rig: Arc<CameraRig>,
    backend: B,
    converter: Box<dyn DepthToRangeConverter>,
    clock: Arc<dyn SimClock>,
    pose: Box<dyn PoseSource>,
    frames: FrameBuffer,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    stats: Arc<LidarStats>,
    depth: Vec<f32>,
    device_ranges: Vec<f32>,
    period: f64,
    transport_time: f64,
    next_capture: f64,
}

pub struct SchedulerParts {
    pub rig: Arc<CameraRig>,
    pub converter: Box<dyn DepthToRangeConverter>,
    pub clock: Arc<dyn SimClock>,
    pub pose: Box<dyn PoseSource>,
    pub frames: FrameBuffer,
    pub running: Arc<AtomicBool>,
    /// Bumped on every start, captures of earlier runs are discarded
    pub generation: Arc<AtomicU64>,
    pub stats: Arc<LidarStats>,
    /// Seconds of simulation time between captures
    pub period: f64,
    /// Simulation time of the first capture
    pub first_capture: f64,
}

impl<B: RenderBackend> CaptureScheduler<B> {
    pub fn new(backend: B, parts: SchedulerParts) -> Self {
        let texels = parts.rig.texels_per_camera();
        let cameras = parts.rig.camera_count();
        Self {
            backend,
            depth: vec![1.; texels],
            device_ranges: vec![f32::NAN; texels * cameras],
            rig: parts.rig,
            converter: parts.converter,
            clock: parts.clock,
            pose: parts.pose,
            frames: parts.frames,
            running: parts.running,
            generation: parts.generation,
            stats: parts.stats,
            period: parts.period,
            transport_time: 0.,
            next_capture: parts.first_capture,
        }
    }

    /// Time reserved for publishing, subtracted from the wait between captures
    pub fn set_transport_time(&mut self, seconds: f64) {
        self.transport_time = seconds.max(0.);
    }

    pub fn next_capture(&self) -> f64 {
        self.next_capture
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Called once per simulation tick. Never blocks.
    pub fn tick(&mut self) -> CaptureOutcome {
        if !self.running.load(Ordering::Acquire) {
            return CaptureOutcome::Stopped;
        }
        let now = self.clock.sim_time();
        if now < self.next_capture {
            return CaptureOutcome::Waiting;
        }
        self.next_capture = now + (self.period - self.transport_time).max(0.);
        self.stats.cycle_started();

        let Some(mut frame) = self.frames.try_acquire() else {
            log::warn!("No free frame slot at {now:.3}s, dropping capture");
            self.stats.no_free_slot();
            return CaptureOutcome::Dropped(DropReason::NoFreeSlot);
        };
        frame.capture_time = now;
        frame.pose = self.pose.world_pose();
        frame.generation = self.generation.load(Ordering::Acquire);

        let texels = self.rig.texels_per_camera();
        for camera in self.rig.cameras().iter().filter(|c| c.overlaps) {
            if let Err(e) = self.backend.render_depth(camera, &mut self.depth) {
                log::warn!("{e}, dropping capture");
                self.stats.render_failed();
                self.frames.release(frame);
                return CaptureOutcome::Dropped(DropReason::RenderFailed);
            }
            let offset = camera.index * texels;
            self.converter.convert(
                DepthImage {
                    width: self.rig.width(),
                    height: self.rig.height(),
                    data: &self.depth,
                },
                &mut self.device_ranges[offset..offset + texels],
            );
        }
        log::debug!("Capture {now:.3}s into slot {}", frame.slot());

        let on_complete = self.continuation(frame);
        self.backend.read_back(&self.device_ranges, on_complete);
        CaptureOutcome::Captured
    }

    fn continuation(&self, mut frame: CapturedFrame) -> ReadbackCallback {
        let frames = self.frames.clone();
        let running = Arc::clone(&self.running);
        let generation = Arc::clone(&self.generation);
        let stats = Arc::clone(&self.stats);
        let clock = Arc::clone(&self.clock);
        let expected = self.device_ranges.len();
        let texels = self.rig.texels_per_camera();

        Box::new(move |result: Result<ReadbackData, ReadbackError>| {
            let stored = result
                .and_then(|data| data.ranges(expected))
                .and_then(|ranges| frame.store(&ranges, texels));
            if let Err(e) = stored {
                log::warn!("{e}, dropping capture of {:.3}s", frame.capture_time);
                stats.readback_failed();
                frames.release(frame);
                return;
            }
            let current = generation.load(Ordering::Acquire);
            if !running.load(Ordering::Acquire) || frame.generation != current {
                frames.release(frame);
                return;
            }
            frame.latency = clock.sim_time() - frame.capture_time;
            stats.record_latency(frame.latency);
            if let Err(frame) = frames.push(frame) {
                log::warn!("Frame queue rejected capture of {:.3}s", frame.capture_time);
                stats.queue_rejected();
                frames.release(frame);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::tests::planar_config, CameraControlInfo, LinearDepthConverter, ManualClock, Pose,
        RenderError, ValidLidarConfig,
    };

    /// Completes readbacks immediately on the calling thread
    struct ConstantBackend {
        depth: f32,
        fail_camera: Option<usize>,
        fail_readback: bool,
        held: Vec<ReadbackCallback>,
        hold: bool,
    }

    impl ConstantBackend {
        fn new(depth: f32) -> Self {
            Self {
                depth,
                fail_camera: None,
                fail_readback: false,
                held: Vec::new(),
                hold: false,
            }
        }
    }

    impl RenderBackend for ConstantBackend {
        fn render_depth(
            &mut self,
            camera: &CameraControlInfo,
            depth: &mut [f32],
        ) -> Result<(), RenderError> {
            if self.fail_camera == Some(camera.index) {
                return Err(RenderError {
                    camera: camera.index,
                    reason: "device lost".into(),
                });
            }
            depth.fill(self.depth);
            Ok(())
        }

        fn read_back(&mut self, device_ranges: &[f32], on_complete: ReadbackCallback) {
            if self.hold {
                self.held.push(on_complete);
            } else if self.fail_readback {
                on_complete(Err(ReadbackError::Transfer("timeout".into())));
            } else {
                on_complete(Ok(ReadbackData::from_ranges(device_ranges)));
            }
        }
    }

    struct Fixture {
        scheduler: CaptureScheduler<ConstantBackend>,
        clock: Arc<ManualClock>,
        frames: FrameBuffer,
        running: Arc<AtomicBool>,
        generation: Arc<AtomicU64>,
        stats: Arc<LidarStats>,
    }

    fn fixture(backend: ConstantBackend) -> Fixture {
        let config = ValidLidarConfig::try_from(planar_config(360, -180., 180.)).unwrap();
        let rig = Arc::new(CameraRig::new(&config.geometry));
        let clock = Arc::new(ManualClock::new(0.));
        let frames = FrameBuffer::new(&rig);
        let running = Arc::new(AtomicBool::new(true));
        let generation = Arc::new(AtomicU64::new(1));
        let stats = Arc::new(LidarStats::default());
        let scheduler = CaptureScheduler::new(
            backend,
            SchedulerParts {
                converter: Box::new(LinearDepthConverter::new(&rig)),
                rig,
                clock: clock.clone(),
                pose: Box::new(Pose::default()),
                frames: frames.clone(),
                running: running.clone(),
                generation: generation.clone(),
                stats: stats.clone(),
                period: config.update_period(),
                first_capture: 0.,
            },
        );
        Fixture {
            scheduler,
            clock,
            frames,
            running,
            generation,
            stats,
        }
    }

    #[test]
    fn waits_for_update_period() {
        let mut f = fixture(ConstantBackend::new(0.1));
        assert_eq!(CaptureOutcome::Captured, f.scheduler.tick());
        f.clock.advance(0.05);
        assert_eq!(CaptureOutcome::Waiting, f.scheduler.tick());
        f.clock.advance(0.05);
        assert_eq!(CaptureOutcome::Captured, f.scheduler.tick());
        assert_eq!(2, f.frames.pending());
    }

    #[test]
    fn transport_time_shortens_wait() {
        let mut f = fixture(ConstantBackend::new(0.1));
        f.scheduler.set_transport_time(0.03);
        f.scheduler.tick();
        assert!((f.scheduler.next_capture() - 0.07).abs() < 1e-12);
    }

    #[test]
    fn frame_carries_converted_ranges() {
        let mut f = fixture(ConstantBackend::new(0.1));
        f.clock.set(2.);
        f.scheduler.tick();
        let frame = f.frames.receiver().try_recv().unwrap();
        assert_eq!(2., frame.capture_time);
        assert!((frame.camera(0)[45] - 3.).abs() < 1e-4);
    }

    #[test]
    fn drops_cycle_without_free_slot() {
        let mut backend = ConstantBackend::new(0.1);
        backend.hold = true;
        let mut f = fixture(backend);
        for _ in 0..5 {
            assert_eq!(CaptureOutcome::Captured, f.scheduler.tick());
            f.clock.advance(0.1);
        }
        assert_eq!(
            CaptureOutcome::Dropped(DropReason::NoFreeSlot),
            f.scheduler.tick()
        );
        // Completing a held readback hands the slot to the queue, not the pool
        let first = f.scheduler.backend_mut().held.remove(0);
        first(Ok(ReadbackData::from_ranges(&vec![1.; 360])));
        assert_eq!(1, f.frames.pending());
        assert_eq!(1, f.stats.snapshot().dropped_no_slot);
    }

    #[test]
    fn render_failure_returns_slot() {
        let mut backend = ConstantBackend::new(0.1);
        backend.fail_camera = Some(1);
        let mut f = fixture(backend);
        assert_eq!(
            CaptureOutcome::Dropped(DropReason::RenderFailed),
            f.scheduler.tick()
        );
        assert_eq!(5, f.frames.available());
    }

    #[test]
    fn readback_failure_returns_slot() {
        let mut backend = ConstantBackend::new(0.1);
        backend.fail_readback = true;
        let mut f = fixture(backend);
        assert_eq!(CaptureOutcome::Captured, f.scheduler.tick());
        assert_eq!(5, f.frames.available());
        assert_eq!(0, f.frames.pending());
        assert_eq!(1, f.stats.snapshot().readback_failures);
    }

    #[test]
    fn late_completion_after_stop_is_discarded() {
        let mut backend = ConstantBackend::new(0.1);
        backend.hold = true;
        let mut f = fixture(backend);
        f.scheduler.tick();
        f.running.store(false, Ordering::Release);
        assert_eq!(CaptureOutcome::Stopped, f.scheduler.tick());

        let held = f.scheduler.backend_mut().held.pop().unwrap();
        held(Ok(ReadbackData::from_ranges(&vec![1.; 360])));
        assert_eq!(0, f.frames.pending());
        assert_eq!(5, f.frames.available());
    }

    #[test]
    fn completion_from_previous_run_is_discarded() {
        let mut backend = ConstantBackend::new(0.1);
        backend.hold = true;
        let mut f = fixture(backend);
        f.scheduler.tick();
        // Stop and restart before the readback lands
        f.running.store(false, Ordering::Release);
        f.generation.fetch_add(1, Ordering::AcqRel);
        f.running.store(true, Ordering::Release);

        let held = f.scheduler.backend_mut().held.pop().unwrap();
        held(Ok(ReadbackData::from_ranges(&vec![1.; 360])));
        assert_eq!(0, f.frames.pending());
        assert_eq!(5, f.frames.available());

        f.clock.advance(0.1);
        f.scheduler.tick();
        let current = f.scheduler.backend_mut().held.pop().unwrap();
        current(Ok(ReadbackData::from_ranges(&vec![1.; 360])));
        assert_eq!(1, f.frames.pending());
    }
}
