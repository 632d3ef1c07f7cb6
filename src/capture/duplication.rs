//! Desktop duplication capture (Windows).
//!
//! Duplicates the primary output and copies a centered, clamped region into a
//! CPU-readable staging texture each call. `AcquireNextFrame` runs with a
//! bounded timeout; an elapsed wait is reported as `Ok(None)` without
//! logging. `DXGI_ERROR_ACCESS_LOST` (mode change, lock screen, exclusive
//! fullscreen handoff) tears the whole device stack down and rebuilds it, and
//! that call also reports `Ok(None)`.

use anyhow::{anyhow, Context, Result};
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
    D3D11_BOX, D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_FLAG, D3D11_MAPPED_SUBRESOURCE,
    D3D11_MAP_READ, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    IDXGIDevice, IDXGIOutput1, IDXGIOutputDuplication, IDXGIResource, DXGI_ERROR_ACCESS_LOST,
    DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_FRAME_INFO,
};

use crate::capture::{CaptureConfig, CaptureStats};
use crate::frame::{Frame, BYTES_PER_PIXEL};

pub struct DuplicationSource {
    config: CaptureConfig,
    state: Option<DuplicationState>,
    stats: CaptureStats,
}

/// Device stack rebuilt as a unit on access loss.
struct DuplicationState {
    _device: ID3D11Device,
    context: ID3D11DeviceContext,
    duplication: IDXGIOutputDuplication,
    staging: ID3D11Texture2D,
    /// Region of the desktop copied each frame, centered and clamped.
    region: Region,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// Center a `width x height` region on a display, clamping to its bounds.
fn centered_region(display_w: u32, display_h: u32, width: u32, height: u32) -> Region {
    let w = width.min(display_w);
    let h = height.min(display_h);
    Region {
        left: (display_w - w) / 2,
        top: (display_h - h) / 2,
        width: w,
        height: h,
    }
}

impl DuplicationSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let state = DuplicationState::initialize(&config)
            .context("initializing desktop duplication")?;
        log::info!(
            "desktop duplication capture at {}x{} (region {:?})",
            config.width,
            config.height,
            state.region
        );
        Ok(Self {
            config,
            state: Some(state),
            stats: CaptureStats::default(),
        })
    }

    pub fn capture(&mut self) -> Result<Option<Frame>> {
        let state = match &self.state {
            Some(state) => state,
            None => {
                // Previous call lost the device; rebuild before capturing.
                self.reinitialize();
                return Ok(None);
            }
        };

        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;
        let acquired = unsafe {
            state.duplication.AcquireNextFrame(
                self.config.timeout_ms,
                &mut frame_info,
                &mut resource,
            )
        };

        if let Err(err) = acquired {
            if err.code() == DXGI_ERROR_WAIT_TIMEOUT {
                self.stats.timeouts += 1;
                return Ok(None);
            }
            if err.code() == DXGI_ERROR_ACCESS_LOST {
                log::warn!("duplication access lost, reinitializing");
                self.state = None;
                self.reinitialize();
                return Ok(None);
            }
            log::error!("AcquireNextFrame failed: {err}");
            return Ok(None);
        }

        let result = self.copy_acquired(resource);
        if let Some(state) = &self.state {
            unsafe {
                let _ = state.duplication.ReleaseFrame();
            }
        }
        match result {
            Ok(frame) => {
                self.stats.frames_captured += 1;
                Ok(Some(frame))
            }
            Err(err) => {
                log::error!("frame copy failed: {err:#}");
                Ok(None)
            }
        }
    }

    fn copy_acquired(&self, resource: Option<IDXGIResource>) -> Result<Frame> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| anyhow!("capture state missing"))?;
        let resource = resource.ok_or_else(|| anyhow!("no resource from AcquireNextFrame"))?;
        let texture: ID3D11Texture2D = resource.cast().context("desktop texture cast")?;
        let region = state.region;

        let src_box = D3D11_BOX {
            left: region.left,
            top: region.top,
            front: 0,
            right: region.left + region.width,
            bottom: region.top + region.height,
            back: 1,
        };
        unsafe {
            state.context.CopySubresourceRegion(
                &state.staging,
                0,
                0,
                0,
                0,
                &texture,
                0,
                Some(&src_box),
            );
        }

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            state
                .context
                .Map(&state.staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .context("mapping staging texture")?;
        }

        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        let mut data = vec![0u8; row_bytes * region.height as usize];
        let pitch = mapped.RowPitch as usize;
        for row in 0..region.height as usize {
            unsafe {
                let src = (mapped.pData as *const u8).add(row * pitch);
                let dst = &mut data[row * row_bytes..(row + 1) * row_bytes];
                std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), row_bytes);
            }
        }

        unsafe {
            state.context.Unmap(&state.staging, 0);
        }

        Ok(Frame::new(data, region.width, region.height))
    }

    fn reinitialize(&mut self) {
        match DuplicationState::initialize(&self.config) {
            Ok(state) => {
                self.stats.reinits += 1;
                self.state = Some(state);
            }
            Err(err) => {
                log::warn!("duplication reinit failed, will retry: {err:#}");
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state.is_some()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.clone()
    }
}

impl DuplicationState {
    fn initialize(config: &CaptureConfig) -> Result<Self> {
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_FLAG(0),
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .context("creating D3D11 device")?;
        }
        let device = device.ok_or_else(|| anyhow!("no D3D11 device returned"))?;
        let context = context.ok_or_else(|| anyhow!("no D3D11 context returned"))?;

        let dxgi_device: IDXGIDevice = device.cast().context("IDXGIDevice cast")?;
        let (duplication, display_w, display_h) = unsafe {
            let adapter = dxgi_device.GetAdapter().context("querying adapter")?;
            let output = adapter.EnumOutputs(0).context("enumerating outputs")?;
            let desc = output.GetDesc().context("reading output desc")?;
            let coords = desc.DesktopCoordinates;
            let output1: IDXGIOutput1 = output.cast().context("IDXGIOutput1 cast")?;
            let duplication = output1
                .DuplicateOutput(&device)
                .context("duplicating output")?;
            (
                duplication,
                (coords.right - coords.left).max(0) as u32,
                (coords.bottom - coords.top).max(0) as u32,
            )
        };

        let region = centered_region(display_w, display_h, config.width, config.height);

        let desc = D3D11_TEXTURE2D_DESC {
            Width: region.width,
            Height: region.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };
        let mut staging: Option<ID3D11Texture2D> = None;
        unsafe {
            device
                .CreateTexture2D(&desc, None, Some(&mut staging))
                .context("creating staging texture")?;
        }
        let staging = staging.ok_or_else(|| anyhow!("no staging texture returned"))?;

        Ok(Self {
            _device: device,
            context,
            duplication,
            staging,
            region,
        })
    }
}
