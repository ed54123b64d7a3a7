use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    noise_model_from_config, CameraRig, CaptureOutcome, CaptureScheduler, CustomNoiseFn,
    DepthToRangeConverter, FrameBuffer, LaserFilter, LidarStatistics, LidarStats,
    LinearDepthConverter, OutputSink, Pose, PoseSource, PostProcessor, RenderBackend,
    ScanMessage, SchedulerParts, SensorRegistry, SimClock, StitchWorker, Stitcher,
    ValidLidarConfig, WorkerContext,
};

#[derive(thiserror::Error, Debug)]
pub enum LidarError {
    #[error("Failed to spawn stitch thread: {0}")]
    WorkerSpawn(#[source] io::Error),
    #[error("Sensor is already running")]
    AlreadyStarted,
}

/// Depth camera based laser scanner.
///
/// [`LidarSensor::tick`] belongs on the render loop, scans are stitched on a dedicated
/// thread and collected with [`LidarSensor::pop_scan`].
pub struct LidarSensor<B> {
    config: ValidLidarConfig,
    rig: Arc<CameraRig>,
    scheduler: CaptureScheduler<B>,
    frames: FrameBuffer,
    sink: OutputSink,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    stats: Arc<LidarStats>,
    custom_noise: Option<CustomNoiseFn>,
    worker: Option<StitchWorker>,
}

pub struct LidarBuilder<'a, B> {
    config: ValidLidarConfig,
    backend: B,
    clock: Arc<dyn SimClock>,
    pose: Box<dyn PoseSource>,
    converter: Option<Box<dyn DepthToRangeConverter>>,
    custom_noise: Option<CustomNoiseFn>,
    registry: Option<&'a SensorRegistry>,
}

impl<'a, B: RenderBackend> LidarBuilder<'a, B> {
    pub fn pose(mut self, pose: impl PoseSource + 'static) -> Self {
        self.pose = Box::new(pose);
        self
    }

    /// Replaces the CPU depth conversion, e.g. with a GPU kernel of the backend
    pub fn converter(mut self, converter: impl DepthToRangeConverter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    /// Noise function used when the noise type is `custom`
    pub fn custom_noise(mut self, f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Self {
        self.custom_noise = Some(Arc::new(f));
        self
    }

    /// Staggers the first capture against other sensors of the registry
    pub fn registry(mut self, registry: &'a SensorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> LidarSensor<B> {
        let rig = Arc::new(CameraRig::new(&self.config.geometry));
        let stats = Arc::new(LidarStats::default());
        let running = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(0));
        let frames = FrameBuffer::new(&rig);
        let sink = OutputSink::new(self.config.output_capacity, stats.clone());

        let period = self.config.update_period();
        let offset = self
            .registry
            .map_or(0., |r| r.register().start_offset(period));
        let converter = self
            .converter
            .unwrap_or_else(|| Box::new(LinearDepthConverter::new(&rig)));

        let scheduler = CaptureScheduler::new(
            self.backend,
            SchedulerParts {
                rig: rig.clone(),
                converter,
                first_capture: self.clock.sim_time() + offset,
                clock: self.clock,
                pose: self.pose,
                frames: frames.clone(),
                running: running.clone(),
                generation: generation.clone(),
                stats: stats.clone(),
                period,
            },
        );

        LidarSensor {
            config: self.config,
            rig,
            scheduler,
            frames,
            sink,
            running,
            generation,
            stats,
            custom_noise: self.custom_noise,
            worker: None,
        }
    }
}

impl<B: RenderBackend> LidarSensor<B> {
    pub fn builder<'a>(
        config: ValidLidarConfig,
        backend: B,
        clock: Arc<dyn SimClock>,
    ) -> LidarBuilder<'a, B> {
        LidarBuilder {
            config,
            backend,
            clock,
            pose: Box::new(Pose::default()),
            converter: None,
            custom_noise: None,
            registry: None,
        }
    }

    /// Spawns the stitch thread and enables capturing
    pub fn start(&mut self) -> Result<(), LidarError> {
        if self.worker.is_some() {
            return Err(LidarError::AlreadyStarted);
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.discard_pending_frames();

        let noise = self.config.noise.as_ref().and_then(|n| {
            noise_model_from_config(n, &self.config.range, self.custom_noise.clone())
        });
        let context = WorkerContext {
            stitcher: Stitcher::new(self.rig.clone()),
            frames: self.frames.clone(),
            post: PostProcessor::new(
                noise,
                LaserFilter::new(&self.config.filter, &self.config.geometry),
                self.stats.clone(),
            ),
            sink: self.sink.clone(),
            scan: ScanMessage::new(self.config.name.clone(), &self.config.geometry),
            running: self.running.clone(),
            generation,
            stats: self.stats.clone(),
        };

        self.running.store(true, Ordering::Release);
        match StitchWorker::spawn(&self.config.name, context) {
            Ok(worker) => {
                self.worker = Some(worker);
                log::info!("Lidar '{}' started", self.config.name);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(LidarError::WorkerSpawn(e))
            }
        }
    }

    /// Stops capturing and joins the stitch thread. Readbacks still in flight are discarded.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
            log::info!("Lidar '{}' stopped", self.config.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Drives capturing, call once per simulation tick from the render thread
    pub fn tick(&mut self) -> CaptureOutcome {
        self.scheduler.tick()
    }

    pub fn set_transport_time(&mut self, seconds: f64) {
        self.scheduler.set_transport_time(seconds);
    }

    pub fn pop_scan(&self) -> Option<ScanMessage> {
        self.sink.pop()
    }

    pub fn drain_scans(&self) -> Vec<ScanMessage> {
        self.sink.drain()
    }

    /// Drops scans not yet collected
    pub fn reset(&mut self) {
        self.sink.clear();
        if !self.is_running() {
            self.discard_pending_frames();
        }
    }

    pub fn statistics(&self) -> LidarStatistics {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &ValidLidarConfig {
        &self.config
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn backend(&self) -> &B {
        self.scheduler.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.scheduler.backend_mut()
    }

    fn discard_pending_frames(&self) {
        let pending = self.frames.receiver();
        while let Ok(frame) = pending.try_recv() {
            self.frames.release(frame);
        }
    }
}

impl<B> Drop for LidarSensor<B> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }
}
