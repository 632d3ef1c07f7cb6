//! Input-gated motion synthesis.
//!
//! A worker thread ticks at a fixed interval while both pointer gates are
//! held and a non-zero step is selected, emitting small relative deltas
//! through the configured injector. Each tick combines a base vertical step
//! with low-amplitude sinusoids and uniform jitter on both axes; fractional
//! remainders carry across ticks so the emitted integers converge on the
//! real-valued sum.
//!
//! Changing the step tears the worker down and restarts it, which resets all
//! phase and accumulator state. Releasing either gate or selecting step zero
//! stops emission entirely.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::inject::PointerInjector;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;
pub const DEFAULT_VERTICAL_AMPLITUDE: f64 = 0.2;
pub const DEFAULT_HORIZONTAL_AMPLITUDE: f64 = 0.1;
pub const DEFAULT_VERTICAL_HZ: f64 = 3.0;
pub const DEFAULT_HORIZONTAL_HZ: f64 = 3.0;
pub const DEFAULT_JITTER: f64 = 0.1;

/// Shape of the synthesized motion.
#[derive(Clone, Copy, Debug)]
pub struct MotionProfile {
    pub tick_interval: Duration,
    /// Sinusoid amplitude added to the vertical base step.
    pub vertical_amplitude: f64,
    /// Sinusoid amplitude on the horizontal axis (no base step).
    pub horizontal_amplitude: f64,
    /// Vertical oscillation frequency.
    pub vertical_hz: f64,
    /// Horizontal oscillation frequency, accumulated independently.
    pub horizontal_hz: f64,
    /// Half-width of the uniform jitter added to each axis per tick.
    pub jitter: f64,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            vertical_amplitude: DEFAULT_VERTICAL_AMPLITUDE,
            horizontal_amplitude: DEFAULT_HORIZONTAL_AMPLITUDE,
            vertical_hz: DEFAULT_VERTICAL_HZ,
            horizontal_hz: DEFAULT_HORIZONTAL_HZ,
            jitter: DEFAULT_JITTER,
        }
    }
}

/// Per-worker oscillation phase and fractional carry. Each axis keeps its
/// own phase accumulator so the frequencies can differ.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionPhase {
    phase_y: f64,
    phase_x: f64,
    carry_x: f64,
    carry_y: f64,
}

impl MotionPhase {
    /// Advance by `dt` seconds and produce the integer delta for one tick.
    ///
    /// The fractional part of each axis is carried into the next tick, so
    /// the emitted sum tracks `step * ticks` on the vertical axis and zero on
    /// the horizontal axis when jitter is disabled.
    pub fn tick<R: Rng>(
        &mut self,
        step: f64,
        profile: &MotionProfile,
        dt: f64,
        rng: &mut R,
    ) -> (i32, i32) {
        let angle_y = TAU * self.phase_y;
        self.phase_y = (self.phase_y + profile.vertical_hz * dt).fract();
        let angle_x = TAU * self.phase_x;
        self.phase_x = (self.phase_x + profile.horizontal_hz * dt).fract();

        let mut raw_y = step + profile.vertical_amplitude * angle_y.sin();
        let mut raw_x = profile.horizontal_amplitude * angle_x.sin();
        if profile.jitter > 0.0 {
            raw_y += rng.gen_range(-profile.jitter..=profile.jitter);
            raw_x += rng.gen_range(-profile.jitter..=profile.jitter);
        }

        self.carry_y += raw_y;
        let dy = self.carry_y.round();
        self.carry_y -= dy;

        self.carry_x += raw_x;
        let dx = self.carry_x.round();
        self.carry_x -= dx;

        (dx as i32, dy as i32)
    }
}

/// State shared between the controller and its worker thread.
struct MotionShared {
    /// Selected vertical step per tick, stored as `f64` bits.
    step_bits: AtomicU64,
    left_held: AtomicBool,
    right_held: AtomicBool,
    cancel: AtomicBool,
}

impl MotionShared {
    fn step(&self) -> f64 {
        f64::from_bits(self.step_bits.load(Ordering::Acquire))
    }

    fn gated(&self) -> bool {
        self.left_held.load(Ordering::Acquire)
            && self.right_held.load(Ordering::Acquire)
            && self.step() != 0.0
    }
}

/// Owns the tick worker and the gate state.
pub struct MotionController {
    shared: Arc<MotionShared>,
    injector: Arc<Mutex<Box<dyn PointerInjector>>>,
    profile: MotionProfile,
    worker: Option<JoinHandle<()>>,
}

impl MotionController {
    pub fn new(injector: Box<dyn PointerInjector>, profile: MotionProfile) -> Self {
        Self {
            shared: Arc::new(MotionShared {
                step_bits: AtomicU64::new(0.0f64.to_bits()),
                left_held: AtomicBool::new(false),
                right_held: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
            }),
            injector: Arc::new(Mutex::new(injector)),
            profile,
            worker: None,
        }
    }

    pub fn step(&self) -> f64 {
        self.shared.step()
    }

    /// Select a new step. The worker is restarted so oscillation phase and
    /// fractional carries start clean for the new magnitude.
    pub fn set_step(&mut self, step: f64) {
        self.stop_worker();
        self.shared.step_bits.store(step.to_bits(), Ordering::Release);
        log::info!("motion step set to {step}");
        self.evaluate();
    }

    pub fn set_left_held(&mut self, held: bool) {
        self.shared.left_held.store(held, Ordering::Release);
        self.evaluate();
    }

    pub fn set_right_held(&mut self, held: bool) {
        self.shared.right_held.store(held, Ordering::Release);
        self.evaluate();
    }

    /// Start or stop the worker to match the current gate state.
    fn evaluate(&mut self) {
        if self.shared.gated() {
            if self.worker.is_none() {
                self.start_worker();
            }
        } else {
            self.stop_worker();
        }
    }

    fn start_worker(&mut self) {
        self.shared.cancel.store(false, Ordering::Release);
        let shared = self.shared.clone();
        let injector = self.injector.clone();
        let profile = self.profile;
        self.worker = Some(thread::spawn(move || {
            let dt = profile.tick_interval.as_secs_f64();
            let mut phase = MotionPhase::default();
            let mut rng = SmallRng::from_entropy();

            while !shared.cancel.load(Ordering::Acquire) {
                thread::sleep(profile.tick_interval);
                if shared.cancel.load(Ordering::Acquire) || !shared.gated() {
                    continue;
                }
                let (dx, dy) = phase.tick(shared.step(), &profile, dt, &mut rng);
                if dx == 0 && dy == 0 {
                    continue;
                }
                let result = match injector.lock() {
                    Ok(mut injector) => injector.move_relative(dx, dy),
                    Err(_) => break,
                };
                if let Err(err) = result {
                    log::warn!("pointer injection failed: {err:#}");
                }
            }
        }));
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.cancel.store(true, Ordering::Release);
            let _ = worker.join();
        }
    }
}

impl Drop for MotionController {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::AtomicUsize;

    fn quiet_profile() -> MotionProfile {
        MotionProfile {
            jitter: 0.0,
            ..MotionProfile::default()
        }
    }

    #[test]
    fn vertical_sum_converges_to_step_times_ticks() {
        // 100 ticks at 3 Hz and 10 ms per tick is exactly three oscillation
        // periods, so the sinusoid contributes nothing net.
        let profile = quiet_profile();
        let mut phase = MotionPhase::default();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut sum_x = 0i64;
        let mut sum_y = 0i64;
        for _ in 0..100 {
            let (dx, dy) = phase.tick(5.0, &profile, 0.01, &mut rng);
            sum_x += dx as i64;
            sum_y += dy as i64;
        }
        assert!((sum_y - 500).abs() <= 1, "sum_y = {sum_y}");
        assert_eq!(sum_x, 0);
    }

    #[test]
    fn axes_oscillate_on_independent_phases() {
        // 5 Hz horizontal against 3 Hz vertical: 100 ticks at 10 ms cover
        // whole periods on both axes, so each sum still converges, and the
        // horizontal deltas must differ from a same-frequency run.
        let split = MotionProfile {
            horizontal_hz: 5.0,
            horizontal_amplitude: 0.6,
            jitter: 0.0,
            ..MotionProfile::default()
        };
        let mut phase = MotionPhase::default();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut split_xs = Vec::new();
        let mut sum_x = 0i64;
        let mut sum_y = 0i64;
        for _ in 0..100 {
            let (dx, dy) = phase.tick(5.0, &split, 0.01, &mut rng);
            split_xs.push(dx);
            sum_x += dx as i64;
            sum_y += dy as i64;
        }
        assert_eq!(sum_x, 0);
        assert!((sum_y - 500).abs() <= 1, "sum_y = {sum_y}");

        let same = MotionProfile {
            horizontal_amplitude: 0.6,
            jitter: 0.0,
            ..MotionProfile::default()
        };
        let mut phase = MotionPhase::default();
        let same_xs: Vec<i32> = (0..100)
            .map(|_| phase.tick(5.0, &same, 0.01, &mut rng).0)
            .collect();
        assert_ne!(split_xs, same_xs);
    }

    #[test]
    fn fractional_steps_accumulate() {
        let profile = MotionProfile {
            vertical_amplitude: 0.0,
            horizontal_amplitude: 0.0,
            jitter: 0.0,
            ..MotionProfile::default()
        };
        let mut phase = MotionPhase::default();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut sum_y = 0i64;
        for _ in 0..10 {
            let (_, dy) = phase.tick(0.4, &profile, 0.01, &mut rng);
            sum_y += dy as i64;
        }
        assert_eq!(sum_y, 4);
    }

    struct CountingInjector {
        calls: Arc<AtomicUsize>,
    }

    impl PointerInjector for CountingInjector {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn move_relative(&mut self, _dx: i32, _dy: i32) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn emission_requires_both_gates_and_a_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = MotionController::new(
            Box::new(CountingInjector {
                calls: calls.clone(),
            }),
            quiet_profile(),
        );

        controller.set_step(4.0);
        controller.set_left_held(true);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        controller.set_left_held(false);
        controller.set_right_held(true);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_step_never_emits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = MotionController::new(
            Box::new(CountingInjector {
                calls: calls.clone(),
            }),
            quiet_profile(),
        );

        controller.set_step(0.0);
        controller.set_left_held(true);
        controller.set_right_held(true);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn emission_starts_once_fully_gated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = MotionController::new(
            Box::new(CountingInjector {
                calls: calls.clone(),
            }),
            quiet_profile(),
        );

        controller.set_step(5.0);
        controller.set_left_held(true);
        controller.set_right_held(true);
        thread::sleep(Duration::from_millis(120));
        controller.set_right_held(false);
        assert!(calls.load(Ordering::SeqCst) > 0);
    }
}
