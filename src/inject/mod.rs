//! Pointer delta injection.
//!
//! Two delivery paths: an optional hardware relay (a vendor device driven
//! through its user-mode library) and a software synthesis fallback. The
//! driver tries the relay on every call and falls back per call, so a relay
//! that recovers mid-session is picked up again without restart.

#[cfg(windows)]
mod relay;
#[cfg(windows)]
mod send_input;

#[cfg(windows)]
pub use relay::RelayInjector;
#[cfg(windows)]
pub use send_input::SendInputInjector;

use anyhow::Result;

/// One way of delivering a relative pointer movement.
pub trait PointerInjector: Send {
    fn name(&self) -> &'static str;

    /// Deliver a relative movement in device units.
    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()>;
}

/// Injector that accepts and discards every delta. Used on platforms with no
/// software path and in headless runs.
pub struct NullInjector;

impl PointerInjector for NullInjector {
    fn name(&self) -> &'static str {
        "null"
    }

    fn move_relative(&mut self, _dx: i32, _dy: i32) -> Result<()> {
        Ok(())
    }
}

/// Hardware-first injector with per-call software fallback.
pub struct Driver {
    hardware: Option<Box<dyn PointerInjector>>,
    software: Box<dyn PointerInjector>,
}

impl Driver {
    pub fn new(
        hardware: Option<Box<dyn PointerInjector>>,
        software: Box<dyn PointerInjector>,
    ) -> Self {
        Self { hardware, software }
    }

    /// Probe the platform paths: relay library if configured and loadable,
    /// software synthesis as fallback.
    pub fn probe(relay_library: Option<&str>) -> Self {
        #[cfg(windows)]
        {
            let hardware: Option<Box<dyn PointerInjector>> = match relay_library {
                Some(path) => match RelayInjector::open(path) {
                    Ok(relay) => {
                        log::info!("hardware relay active: {path}");
                        Some(Box::new(relay))
                    }
                    Err(err) => {
                        log::warn!("hardware relay unavailable ({err:#}), software only");
                        None
                    }
                },
                None => None,
            };
            Self::new(hardware, Box::new(SendInputInjector::new()))
        }
        #[cfg(not(windows))]
        {
            if relay_library.is_some() {
                log::warn!("hardware relay is only supported on Windows");
            }
            Self::new(None, Box::new(NullInjector))
        }
    }

    pub fn has_hardware(&self) -> bool {
        self.hardware.is_some()
    }

    /// Deliver a delta, preferring the hardware path. A hardware failure is
    /// logged and retried on the software path within the same call; the
    /// preference is re-evaluated on every call.
    pub fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        if let Some(hardware) = &mut self.hardware {
            match hardware.move_relative(dx, dy) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log::debug!("{} injector failed ({err:#}), falling back", hardware.name());
                }
            }
        }
        self.software.move_relative(dx, dy)
    }
}

impl PointerInjector for Driver {
    fn name(&self) -> &'static str {
        "driver"
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        Driver::move_relative(self, dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<(i32, i32)>>>,
        fail: bool,
    }

    impl PointerInjector for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
            if self.fail {
                return Err(anyhow!("synthetic injector failure"));
            }
            self.calls.lock().unwrap().push((dx, dy));
            Ok(())
        }
    }

    #[test]
    fn hardware_path_preferred_when_healthy() {
        let hw_calls = Arc::new(Mutex::new(Vec::new()));
        let sw_calls = Arc::new(Mutex::new(Vec::new()));
        let mut driver = Driver::new(
            Some(Box::new(Recorder {
                calls: hw_calls.clone(),
                fail: false,
            })),
            Box::new(Recorder {
                calls: sw_calls.clone(),
                fail: false,
            }),
        );

        driver.move_relative(3, -2).unwrap();
        assert_eq!(*hw_calls.lock().unwrap(), vec![(3, -2)]);
        assert!(sw_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn hardware_failure_falls_back_within_the_call() {
        let sw_calls = Arc::new(Mutex::new(Vec::new()));
        let mut driver = Driver::new(
            Some(Box::new(Recorder {
                calls: Arc::default(),
                fail: true,
            })),
            Box::new(Recorder {
                calls: sw_calls.clone(),
                fail: false,
            }),
        );

        driver.move_relative(1, 1).unwrap();
        driver.move_relative(2, 2).unwrap();
        assert_eq!(*sw_calls.lock().unwrap(), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn no_hardware_goes_straight_to_software() {
        let sw_calls = Arc::new(Mutex::new(Vec::new()));
        let mut driver = Driver::new(
            None,
            Box::new(Recorder {
                calls: sw_calls.clone(),
                fail: false,
            }),
        );
        driver.move_relative(0, 5).unwrap();
        assert_eq!(*sw_calls.lock().unwrap(), vec![(0, 5)]);
    }
}
