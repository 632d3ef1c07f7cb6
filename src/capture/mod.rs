//! Screen frame sources.
//!
//! A source produces owned BGRA `Frame`s from a fixed-size region centered on
//! the primary display. Backends are selected by source URI:
//! - `stub://…` synthetic scene generator (tests, headless runs);
//!   `stub://flaky` interleaves timeouts, transient errors and reinits
//! - `duplication://primary` desktop duplication (Windows)
//!
//! Capture never blocks longer than the configured bounded wait; a timeout
//! with no new frame is a normal, silent outcome. Device loss is handled
//! inside the source by full reinitialization. The capture resolution is
//! fixed at construction and never changes mid-session.

mod synthetic;

#[cfg(windows)]
mod duplication;

pub use synthetic::SyntheticSource;

#[cfg(windows)]
pub use duplication::DuplicationSource;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 640;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u32 = 100;

/// Configuration for a screen source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Backend URI (`stub://scene`, `duplication://primary`).
    pub source: String,
    /// Fixed capture region width, centered on the primary display.
    pub width: u32,
    /// Fixed capture region height.
    pub height: u32,
    /// Bounded per-call wait for a new frame.
    pub timeout_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: default_source_uri().to_string(),
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
        }
    }
}

pub fn default_source_uri() -> &'static str {
    if cfg!(windows) {
        "duplication://primary"
    } else {
        "stub://scene"
    }
}

/// Counters exposed by every backend.
#[derive(Clone, Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: u64,
    /// Bounded waits that elapsed with no new frame.
    pub timeouts: u64,
    /// Full backend reinitializations after device loss.
    pub reinits: u64,
}

/// Screen frame source with URI-selected backends.
pub struct ScreenSource {
    backend: Backend,
}

enum Backend {
    Synthetic(SyntheticSource),
    #[cfg(windows)]
    Duplication(DuplicationSource),
}

impl ScreenSource {
    /// Construct the backend for `config.source`.
    ///
    /// Backend unavailability is fatal here; per-frame failures after
    /// construction are recoverable and reported as `None`.
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("capture region must be non-empty"));
        }
        if let Some(scene) = config.source.strip_prefix("stub://") {
            return Ok(Self {
                backend: Backend::Synthetic(SyntheticSource::new(config.clone(), scene)),
            });
        }
        if config.source.starts_with("duplication://") {
            #[cfg(windows)]
            {
                return Ok(Self {
                    backend: Backend::Duplication(DuplicationSource::new(config.clone())?),
                });
            }
            #[cfg(not(windows))]
            {
                return Err(anyhow!(
                    "desktop duplication capture is only available on Windows"
                ));
            }
        }
        Err(anyhow!("unsupported capture source '{}'", config.source))
    }

    /// Acquire the next frame.
    ///
    /// `Ok(None)` covers the bounded-wait timeout and the tick on which a
    /// device loss was detected and the backend reinitialized itself.
    pub fn capture(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            Backend::Synthetic(source) => source.capture(),
            #[cfg(windows)]
            Backend::Duplication(source) => source.capture(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            Backend::Synthetic(source) => source.is_healthy(),
            #[cfg(windows)]
            Backend::Duplication(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        match &self.backend {
            Backend::Synthetic(source) => source.stats(),
            #[cfg(windows)]
            Backend::Duplication(source) => source.stats(),
        }
    }
}
