//! Hardware relay injector.
//!
//! Drives an external input relay device through its user-mode library,
//! resolved at runtime so the dependency stays optional. The library is
//! expected to export a small C surface:
//!
//! ```text
//! int  relay_open(void);
//! void relay_close(void);
//! int  relay_connected(void);
//! void relay_move(int dx, int dy);
//! ```
//!
//! Failure to load or open is reported at probe time; a device that drops
//! off mid-session surfaces as per-call errors and the driver falls back to
//! software synthesis.

use std::ffi::c_int;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use windows::core::{HSTRING, PCSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use crate::inject::PointerInjector;

type OpenFn = unsafe extern "C" fn() -> c_int;
type CloseFn = unsafe extern "C" fn();
type ConnectedFn = unsafe extern "C" fn() -> c_int;
type MoveFn = unsafe extern "C" fn(c_int, c_int);

pub struct RelayInjector {
    library: HMODULE,
    close: CloseFn,
    connected: ConnectedFn,
    move_fn: MoveFn,
}

// The resolved function pointers are plain C entry points; the library
// handle is only released on drop.
unsafe impl Send for RelayInjector {}

fn resolve(library: HMODULE, name: &'static str) -> Result<unsafe extern "system" fn() -> isize> {
    unsafe { GetProcAddress(library, PCSTR(name.as_ptr())) }
        .ok_or_else(|| anyhow!("relay library missing symbol {}", name.trim_end_matches('\0')))
}

impl RelayInjector {
    /// Load the relay library and open the device.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { LoadLibraryW(&HSTRING::from(path.as_os_str())) }
            .with_context(|| format!("loading relay library {}", path.display()))?;

        // Symbol names are NUL-terminated for PCSTR.
        let open: OpenFn = unsafe { std::mem::transmute(resolve(library, "relay_open\0")?) };
        let close: CloseFn = unsafe { std::mem::transmute(resolve(library, "relay_close\0")?) };
        let connected: ConnectedFn =
            unsafe { std::mem::transmute(resolve(library, "relay_connected\0")?) };
        let move_fn: MoveFn = unsafe { std::mem::transmute(resolve(library, "relay_move\0")?) };

        if unsafe { open() } == 0 {
            unsafe {
                let _ = FreeLibrary(library);
            }
            return Err(anyhow!("relay device did not open"));
        }

        Ok(Self {
            library,
            close,
            connected,
            move_fn,
        })
    }
}

impl PointerInjector for RelayInjector {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<()> {
        if unsafe { (self.connected)() } == 0 {
            return Err(anyhow!("relay device not connected"));
        }
        unsafe { (self.move_fn)(dx, dy) };
        Ok(())
    }
}

impl Drop for RelayInjector {
    fn drop(&mut self) {
        unsafe {
            (self.close)();
            let _ = FreeLibrary(self.library);
        }
    }
}
