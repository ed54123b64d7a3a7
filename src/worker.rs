use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::{
    CapturedFrame, FrameBuffer, LidarStats, OutputSink, PostProcessor, ScanMessage, Stitcher,
};

/// Everything the stitch thread owns
pub struct WorkerContext {
    pub stitcher: Stitcher,
    pub frames: FrameBuffer,
    pub post: PostProcessor,
    pub sink: OutputSink,
    pub scan: ScanMessage,
    pub running: Arc<AtomicBool>,
    /// Run the worker was spawned for, frames of other runs are dropped
    pub generation: u64,
    pub stats: Arc<LidarStats>,
}

/// Consumer thread turning captured frames into published scans
pub struct StitchWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
}

impl StitchWorker {
    pub fn spawn(name: &str, context: WorkerContext) -> io::Result<Self> {
        let (shutdown, shutdown_rx) = bounded(0);
        let handle = thread::Builder::new()
            .name(format!("{name}-stitch"))
            .spawn(move || run(context, shutdown_rx))?;
        Ok(Self {
            handle: Some(handle),
            shutdown: Some(shutdown),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wakes the thread and waits for it to finish its current frame
    pub fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Stitch thread panicked");
            }
        }
    }
}

impl Drop for StitchWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut context: WorkerContext, shutdown: Receiver<()>) {
    log::info!("Stitch thread for '{}' started", context.scan.frame);
    let frames = context.frames.receiver();
    loop {
        select! {
            recv(frames) -> frame => match frame {
                Ok(frame) => context.process(frame),
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
    log::info!("Stitch thread for '{}' stopped", context.scan.frame);
}

impl WorkerContext {
    fn process(&mut self, frame: CapturedFrame) {
        if !self.running.load(Ordering::Acquire) || frame.generation != self.generation {
            self.frames.release(frame);
            return;
        }

        let report = self.stitcher.stitch(&frame, &mut self.scan);
        if report.segments_skipped > 0 {
            self.stats.segments_skipped(report.segments_skipped);
        }
        self.scan.time = frame.capture_time;
        self.scan.world_pose = frame.pose;
        self.frames.release(frame);

        self.post.apply(&mut self.scan);
        self.sink.publish(self.scan.clone());
        self.stats.scan_published();
        log::debug!(
            "Published scan of {:.3}s, {} cameras",
            self.scan.time,
            report.cameras_copied
        );
    }
}
