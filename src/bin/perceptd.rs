//! Screen perception daemon.
//!
//! Wires the capture pipeline, detector, overlay, motion controller and
//! input router together, then idles until interrupted, logging a health
//! line periodically.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use percept::config::{PerceptConfig, ENV_CONFIG_PATH};
use percept::detect::{Detector, StubBackend};
use percept::frame::Frame;
use percept::inject::Driver;
use percept::input::{InputEvent, InputRouter};
use percept::motion::MotionController;
use percept::pipeline::{CapturePipeline, DisplaySink, NullSink};

#[derive(Debug, Parser)]
#[command(name = "perceptd", about = "Screen perception and response daemon")]
struct Args {
    /// Config file path (JSON). Falls back to $PERCEPT_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture source URI, e.g. stub://scene or duplication://primary.
    #[arg(long)]
    source: Option<String>,

    /// Detection model file. Requires a build with an inference backend.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Write periodic PNG snapshots of the displayed frame here.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Capture and display only, skipping detection entirely.
    #[arg(long)]
    no_detect: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Sink writing every Nth presented frame as a PNG.
struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    presented: AtomicU64,
}

impl SnapshotSink {
    fn new(dir: PathBuf, every: u64) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        Ok(Self {
            dir,
            every,
            presented: AtomicU64::new(0),
        })
    }

    fn write_png(&self, frame: &Frame, index: u64) -> Result<()> {
        let mut rgba = frame.pixels_cloned();
        // Stored frames are BGRA; PNG wants RGBA.
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        let image = image::RgbaImage::from_raw(frame.width(), frame.height(), rgba)
            .context("snapshot buffer size mismatch")?;
        let path = self.dir.join(format!("frame-{index:06}.png"));
        image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

impl DisplaySink for SnapshotSink {
    fn present(&self, frame: &Arc<Frame>) {
        let n = self.presented.fetch_add(1, Ordering::Relaxed);
        if n % self.every != 0 {
            return;
        }
        if let Err(err) = self.write_png(frame, n) {
            log::warn!("snapshot failed: {err:#}");
        }
    }

    fn clear(&self) {
        self.presented.store(0, Ordering::Relaxed);
    }
}

fn build_detector(config: &PerceptConfig) -> Result<Detector> {
    #[cfg(feature = "backend-tract")]
    if let Some(path) = &config.model_path {
        let detector = Detector::from_model_path(path, config.detector_config())?;
        log::info!("detector backend: {}", detector.backend_name());
        return Ok(detector);
    }
    #[cfg(not(feature = "backend-tract"))]
    if config.model_path.is_some() {
        log::warn!("model configured but this build carries no inference backend, using stub");
    }
    Ok(Detector::new(
        Box::new(StubBackend::new(config.class_names.len())),
        config.detector_config(),
    ))
}

fn load_config(args: &Args) -> Result<PerceptConfig> {
    let mut config = PerceptConfig::default();
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));
    if let Some(path) = path {
        config.apply_file(&path)?;
    }
    config.apply_env()?;

    if let Some(source) = &args.source {
        config.capture.source = source.clone();
    }
    if let Some(model) = &args.model {
        config.model_path = Some(model.clone());
    }
    if let Some(dir) = &args.snapshot_dir {
        config.snapshot_dir = Some(dir.clone());
    }
    if args.no_detect {
        config.detect_enabled = false;
    }

    config.validate()?;
    config.steps.ensure_default();
    Ok(config)
}

/// Line-oriented control channel on stdin, for headless runs and scripting.
/// One command per line: `1`/`2`/`3`, `wheel-up`, `wheel-down`, `left-down`,
/// `left-up`, `right-down`, `right-up`.
fn spawn_control(router: Arc<InputRouter>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::BufRead::read_line(&mut stdin.lock(), &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let event = match line.trim() {
                "" => continue,
                "1" => InputEvent::Hotkey(1),
                "2" => InputEvent::Hotkey(2),
                "3" => InputEvent::Hotkey(3),
                "wheel-up" => InputEvent::WheelUp,
                "wheel-down" => InputEvent::WheelDown,
                "left-down" => InputEvent::LeftDown,
                "left-up" => InputEvent::LeftUp,
                "right-down" => InputEvent::RightDown,
                "right-up" => InputEvent::RightUp,
                other => {
                    log::warn!("unknown control command '{other}'");
                    continue;
                }
            };
            router.handle(event);
        }
    });
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .init();

    let config = load_config(&args)?;
    log::info!(
        "perceptd starting: source={} region={}x{} model={:?}",
        config.capture.source,
        config.capture.width,
        config.capture.height,
        config.model_path
    );

    let driver = Driver::probe(config.relay_library.as_deref());
    let has_hardware = driver.has_hardware();
    let controller = MotionController::new(Box::new(driver), config.motion);
    let router = Arc::new(InputRouter::new(
        controller,
        config.steps.clone(),
        config.slots.clone(),
    ));

    let detector = if config.detect_enabled {
        Some(build_detector(&config)?)
    } else {
        log::info!("detection disabled, capture and display only");
        None
    };
    let sink: Arc<dyn DisplaySink> = match &config.snapshot_dir {
        Some(dir) => Arc::new(SnapshotSink::new(dir.clone(), 30)?),
        None => Arc::new(NullSink),
    };

    let mut pipeline = CapturePipeline::new(
        config.capture.clone(),
        Duration::from_millis(config.frame_interval_ms),
        detector,
        sink,
    );
    pipeline.start()?;

    spawn_control(router.clone());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("installing signal handler")?;
    }

    let mut since_health = 0u32;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));
        since_health += 1;
        if since_health >= 10 {
            since_health = 0;
            let stats = pipeline.capture_stats();
            log::info!(
                "health: fps={:.1} frames={} timeouts={} reinits={} healthy={} relay={} step={}",
                pipeline.fps(),
                stats.frames_captured,
                stats.timeouts,
                stats.reinits,
                pipeline.is_healthy(),
                has_hardware,
                router.current_step()
            );
        }
    }

    log::info!("shutting down");
    pipeline.stop();
    Ok(())
}
