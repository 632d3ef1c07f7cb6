//! Synthetic frame generator.
//!
//! Deterministic moving gradient with a bright block sweeping across the
//! region, enough structure to exercise preprocessing, overlay drawing and
//! snapshot sinks without a display. The `flaky` scene cycles through the
//! per-tick capture outcomes a real backend produces (frame, bounded-wait
//! timeout, transient error, device loss with reinit) so the loop's recovery
//! arms can be driven without hardware.

use anyhow::{anyhow, Result};

use crate::capture::{CaptureConfig, CaptureStats};
use crate::frame::{Frame, BYTES_PER_PIXEL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SceneMode {
    /// Every call yields a frame.
    Steady,
    /// Four-tick cycle: frame, timeout, transient error, reinit.
    Flaky,
}

pub struct SyntheticSource {
    config: CaptureConfig,
    scene: String,
    mode: SceneMode,
    ticks: u64,
    stats: CaptureStats,
}

impl SyntheticSource {
    pub fn new(config: CaptureConfig, scene: &str) -> Self {
        let mode = if scene == "flaky" {
            SceneMode::Flaky
        } else {
            SceneMode::Steady
        };
        log::info!(
            "synthetic capture source '{}' at {}x{}",
            scene,
            config.width,
            config.height
        );
        Self {
            config,
            scene: scene.to_string(),
            mode,
            ticks: 0,
            stats: CaptureStats::default(),
        }
    }

    pub fn capture(&mut self) -> Result<Option<Frame>> {
        let tick = self.ticks;
        self.ticks += 1;

        if self.mode == SceneMode::Flaky {
            match tick % 4 {
                1 => {
                    // Bounded wait elapsed with no new frame.
                    self.stats.timeouts += 1;
                    return Ok(None);
                }
                2 => return Err(anyhow!("synthetic transient capture failure")),
                3 => {
                    // Device loss: the backend rebuilds itself and the tick
                    // yields nothing.
                    self.stats.reinits += 1;
                    return Ok(None);
                }
                _ => {}
            }
        }

        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut data = vec![0u8; width * height * BYTES_PER_PIXEL];

        let t = tick as usize;
        let block_x = (t * 7) % width.max(1);
        let block_y = (t * 3) % height.max(1);
        let block = (width.min(height) / 8).max(1);

        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) * BYTES_PER_PIXEL;
                let in_block = x.abs_diff(block_x) < block && y.abs_diff(block_y) < block;
                if in_block {
                    data[idx] = 255;
                    data[idx + 1] = 255;
                    data[idx + 2] = 255;
                } else {
                    data[idx] = (x * 255 / width.max(1)) as u8;
                    data[idx + 1] = (y * 255 / height.max(1)) as u8;
                    data[idx + 2] = ((x + y + t) % 256) as u8;
                }
                data[idx + 3] = 255;
            }
        }

        self.stats.frames_captured += 1;
        Ok(Some(Frame::new(
            data,
            self.config.width,
            self.config.height,
        )))
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.clone()
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }
}
