//! Capture/detect/display pipeline.
//!
//! One worker thread paces the capture loop, runs detection when a detector
//! is attached, draws the overlay, and publishes the finished frame. The
//! published frame lives in a single shared slot; the previous frame is
//! dropped inside the slot lock so its pixels are scrubbed before the new
//! one becomes visible. Presentation happens outside the lock.
//!
//! `stop` is fully synchronous: when it returns the worker has exited, the
//! slot is empty and the sink has been cleared, so a following `start`
//! observes no residue from the previous session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::capture::{CaptureConfig, CaptureStats, ScreenSource};
use crate::detect::Detector;
use crate::frame::Frame;
use crate::overlay;

/// Where finished frames go. Implementations must tolerate being called
/// from the pipeline worker thread.
pub trait DisplaySink: Send + Sync {
    fn present(&self, frame: &Arc<Frame>);

    /// The session ended; drop any retained frame handles.
    fn clear(&self);
}

/// Sink that ignores every frame.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn present(&self, _frame: &Arc<Frame>) {}
    fn clear(&self) {}
}

/// Rolling one-second window over frame timestamps.
struct RateCounter {
    window: Duration,
    samples: VecDeque<Instant>,
}

impl RateCounter {
    fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    fn record(&mut self, now: Instant) -> f64 {
        self.samples.push_back(now);
        while let Some(front) = self.samples.front() {
            if now.duration_since(*front) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        self.samples.len() as f64 / self.window.as_secs_f64()
    }
}

struct PipelineShared {
    /// Latest finished frame; old frame dropped inside the lock on swap.
    slot: Mutex<Option<Arc<Frame>>>,
    cancel: AtomicBool,
    /// Rolling FPS as `f64` bits.
    fps_bits: AtomicU64,
    healthy: AtomicBool,
    stats: Mutex<CaptureStats>,
}

pub struct CapturePipeline {
    config: CaptureConfig,
    frame_interval: Duration,
    /// Retained across stop/start so a reloaded session reuses the model.
    detector: Option<Arc<Mutex<Detector>>>,
    sink: Arc<dyn DisplaySink>,
    shared: Arc<PipelineShared>,
    worker: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    pub fn new(
        config: CaptureConfig,
        frame_interval: Duration,
        detector: Option<Detector>,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            config,
            frame_interval,
            detector: detector.map(|d| Arc::new(Mutex::new(d))),
            sink,
            shared: Arc::new(PipelineShared {
                slot: Mutex::new(None),
                cancel: AtomicBool::new(false),
                fps_bits: AtomicU64::new(0.0f64.to_bits()),
                healthy: AtomicBool::new(false),
                stats: Mutex::new(CaptureStats::default()),
            }),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start the capture loop.
    ///
    /// The source is constructed on the calling thread so backend
    /// unavailability surfaces here instead of dying silently in the worker.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(anyhow!("pipeline already running"));
        }

        let source = ScreenSource::new(&self.config).context("opening capture source")?;
        self.shared.cancel.store(false, Ordering::Release);
        self.shared
            .fps_bits
            .store(0.0f64.to_bits(), Ordering::Release);
        self.shared.healthy.store(true, Ordering::Release);

        let shared = self.shared.clone();
        let detector = self.detector.clone();
        let sink = self.sink.clone();
        let interval = self.frame_interval;
        self.worker = Some(thread::spawn(move || {
            run_loop(source, detector, sink, shared, interval);
        }));
        log::info!("capture pipeline started ({})", self.config.source);
        Ok(())
    }

    /// Stop the loop, drop the published frame and clear the sink. All of it
    /// completes before this returns.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.cancel.store(true, Ordering::Release);
        let _ = worker.join();

        {
            let mut slot = match self.shared.slot.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Dropping here zeroizes the pixels while the slot is held.
            slot.take();
        }
        self.sink.clear();
        self.shared
            .fps_bits
            .store(0.0f64.to_bits(), Ordering::Release);
        self.shared.healthy.store(false, Ordering::Release);
        log::info!("capture pipeline stopped");
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        match self.shared.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        }
    }

    pub fn fps(&self) -> f64 {
        f64::from_bits(self.shared.fps_bits.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.shared.healthy.load(Ordering::Acquire)
    }

    pub fn capture_stats(&self) -> CaptureStats {
        match self.shared.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut source: ScreenSource,
    detector: Option<Arc<Mutex<Detector>>>,
    sink: Arc<dyn DisplaySink>,
    shared: Arc<PipelineShared>,
    interval: Duration,
) {
    let mut rate = RateCounter::new(Duration::from_secs(1));

    while !shared.cancel.load(Ordering::Acquire) {
        let tick_start = Instant::now();

        match source.capture() {
            Ok(Some(frame)) => {
                process_frame(frame, &detector, &sink, &shared, &mut rate);
            }
            Ok(None) => {}
            Err(err) => {
                // Per-frame failures never stop the loop.
                log::error!("capture failed: {err:#}");
            }
        }

        shared.healthy.store(source.is_healthy(), Ordering::Release);
        if let Ok(mut stats) = shared.stats.lock() {
            *stats = source.stats();
        }

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

fn process_frame(
    frame: Frame,
    detector: &Option<Arc<Mutex<Detector>>>,
    sink: &Arc<dyn DisplaySink>,
    shared: &Arc<PipelineShared>,
    rate: &mut RateCounter,
) {
    let detections = match detector {
        Some(detector) => match detector.lock() {
            Ok(mut detector) => detector.detect(&frame),
            Err(_) => Vec::new(),
        },
        None => Vec::new(),
    };

    // With nothing to draw the captured frame is presented as-is.
    let finished = if detections.is_empty() {
        frame
    } else {
        overlay::render(&frame, &detections)
    };

    let published = Arc::new(finished);
    {
        let mut slot = match shared.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Old frame drops (and zeroizes) inside the lock.
        *slot = Some(published.clone());
    }
    sink.present(&published);

    let fps = rate.record(Instant::now());
    shared.fps_bits.store(fps.to_bits(), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_counter_counts_within_window() {
        let mut rate = RateCounter::new(Duration::from_secs(1));
        let base = Instant::now();
        for i in 0..10 {
            rate.record(base + Duration::from_millis(i * 50));
        }
        let fps = rate.record(base + Duration::from_millis(500));
        assert_eq!(fps, 11.0);
    }

    #[test]
    fn rate_counter_expires_old_samples() {
        let mut rate = RateCounter::new(Duration::from_secs(1));
        let base = Instant::now();
        rate.record(base);
        rate.record(base + Duration::from_millis(10));
        let fps = rate.record(base + Duration::from_millis(2500));
        assert_eq!(fps, 1.0);
    }

    #[test]
    fn stop_before_start_is_harmless() {
        let config = CaptureConfig {
            source: "stub://scene".into(),
            width: 32,
            height: 32,
            timeout_ms: 100,
        };
        let mut pipeline =
            CapturePipeline::new(config, Duration::from_millis(16), None, Arc::new(NullSink));
        pipeline.stop();
        assert!(!pipeline.is_running());
        assert!(pipeline.latest_frame().is_none());
    }
}
