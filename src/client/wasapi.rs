//! WASAPI engine backed by `IAudioClient`
//!
//! Every format the engine allocates (mix format, closest match) is decoded
//! into an owned [`SampleFormat`] and freed before the call returns.

use std::ptr;
use std::slice;
use uuid::Uuid;
use windows::core::GUID;
use windows::Win32::Media::Audio::{
    eConsole, eRender, IAudioClient, IAudioRenderClient, IMMDeviceEnumerator, MMDeviceEnumerator,
    AUDCLNT_SHAREMODE, AUDCLNT_SHAREMODE_EXCLUSIVE, AUDCLNT_SHAREMODE_SHARED, WAVEFORMATEX,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use crate::audio::format::{SampleFormat, WAVE_FORMAT_EX_SIZE};
use crate::audio::timing::{DevicePeriod, ReferenceTime};
use crate::client::engine::{
    AudioEngine, EngineResult, FormatQuery, ShareMode, StreamFlags, RENDER_CLIENT_SERVICE,
};
use crate::client::status::HResult;

fn status(e: windows::core::Error) -> HResult {
    HResult(e.code().0)
}

fn share_mode(mode: ShareMode) -> AUDCLNT_SHAREMODE {
    match mode {
        ShareMode::Shared => AUDCLNT_SHAREMODE_SHARED,
        ShareMode::Exclusive => AUDCLNT_SHAREMODE_EXCLUSIVE,
    }
}

/// Join the multithreaded apartment on the calling thread
pub fn com_initialize() -> EngineResult<()> {
    unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.map_err(status)
}

/// Open the default render endpoint of the console role
pub fn default_output_engine() -> EngineResult<WasapiEngine> {
    unsafe {
        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(status)?;
        let device = enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(status)?;
        let client: IAudioClient = device.Activate(CLSCTX_ALL, None).map_err(status)?;
        tracing::debug!("Activated audio client on default render endpoint");
        Ok(WasapiEngine { client })
    }
}

/// Engine allocation released on every exit path
struct CoTaskMem(*mut WAVEFORMATEX);

impl Drop for CoTaskMem {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { CoTaskMemFree(Some(self.0 as *const _)) };
        }
    }
}

impl CoTaskMem {
    /// Copy the blob behind the pointer into an owned format
    fn decode(&self) -> EngineResult<SampleFormat> {
        if self.0.is_null() {
            return Err(HResult::E_POINTER);
        }
        let bytes = unsafe {
            let cb_size = ptr::addr_of!((*self.0).cbSize).read_unaligned();
            slice::from_raw_parts(self.0 as *const u8, WAVE_FORMAT_EX_SIZE + cb_size as usize)
        };
        SampleFormat::from_wave_format_bytes(bytes).map_err(|e| {
            tracing::warn!("Engine returned an undecodable format: {}", e);
            HResult::E_INVALIDARG
        })
    }
}

/// An `IAudioClient` on one endpoint
pub struct WasapiEngine {
    client: IAudioClient,
}

impl WasapiEngine {
    pub fn from_client(client: IAudioClient) -> Self {
        Self { client }
    }
}

impl AudioEngine for WasapiEngine {
    type RenderService = WasapiRenderClient;

    fn get_mix_format(&mut self) -> EngineResult<SampleFormat> {
        let blob = CoTaskMem(unsafe { self.client.GetMixFormat() }.map_err(status)?);
        blob.decode()
    }

    fn initialize(
        &mut self,
        mode: ShareMode,
        flags: StreamFlags,
        buffer_duration: ReferenceTime,
        periodicity: ReferenceTime,
        format: &SampleFormat,
        session_id: &Uuid,
    ) -> EngineResult<()> {
        let blob = format.to_wave_format_bytes();
        let guid = GUID::from_u128(session_id.as_u128());
        unsafe {
            self.client.Initialize(
                share_mode(mode),
                flags.bits(),
                buffer_duration.ticks(),
                periodicity.ticks(),
                blob.as_ptr() as *const WAVEFORMATEX,
                Some(&guid as *const GUID),
            )
        }
        .map_err(status)
    }

    fn get_buffer_size(&mut self) -> EngineResult<u32> {
        unsafe { self.client.GetBufferSize() }.map_err(status)
    }

    fn get_stream_latency(&mut self) -> EngineResult<ReferenceTime> {
        unsafe { self.client.GetStreamLatency() }
            .map(ReferenceTime)
            .map_err(status)
    }

    fn get_current_padding(&mut self) -> EngineResult<u32> {
        unsafe { self.client.GetCurrentPadding() }.map_err(status)
    }

    fn get_device_period(&mut self) -> EngineResult<DevicePeriod> {
        let mut default = 0i64;
        let mut minimum = 0i64;
        unsafe {
            self.client
                .GetDevicePeriod(Some(&mut default as *mut i64), Some(&mut minimum as *mut i64))
        }
        .map_err(status)?;
        Ok(DevicePeriod {
            default: ReferenceTime(default),
            minimum: ReferenceTime(minimum),
        })
    }

    fn is_format_supported(&mut self, mode: ShareMode, format: &SampleFormat) -> FormatQuery {
        let blob = format.to_wave_format_bytes();
        let mut closest: *mut WAVEFORMATEX = ptr::null_mut();
        let hr = unsafe {
            // Exclusive mode must not be handed a closest-match pointer
            let out = match mode {
                ShareMode::Shared => Some(&mut closest as *mut _),
                ShareMode::Exclusive => None,
            };
            self.client
                .IsFormatSupported(share_mode(mode), blob.as_ptr() as *const WAVEFORMATEX, out)
        };

        let closest = CoTaskMem(closest);
        let closest_match = if closest.0.is_null() {
            None
        } else {
            closest.decode().ok()
        };
        FormatQuery::new(HResult(hr.0), closest_match)
    }

    fn get_service(&mut self, service_id: &Uuid) -> EngineResult<WasapiRenderClient> {
        if *service_id != RENDER_CLIENT_SERVICE {
            return Err(HResult::E_NOINTERFACE);
        }
        let client: IAudioRenderClient = unsafe { self.client.GetService() }.map_err(status)?;
        Ok(WasapiRenderClient { client })
    }

    fn start(&mut self) -> EngineResult<()> {
        unsafe { self.client.Start() }.map_err(status)
    }

    fn stop(&mut self) -> EngineResult<()> {
        unsafe { self.client.Stop() }.map_err(status)
    }

    fn reset(&mut self) -> EngineResult<()> {
        unsafe { self.client.Reset() }.map_err(status)
    }
}

/// `IAudioRenderClient` handed to the render side
pub struct WasapiRenderClient {
    client: IAudioRenderClient,
}

impl WasapiRenderClient {
    /// Borrow `frames` frames of the endpoint buffer, let `fill` write them,
    /// and release them back to the engine.
    pub fn write_frames(
        &self,
        frames: u32,
        frame_bytes: usize,
        fill: impl FnOnce(&mut [u8]),
    ) -> EngineResult<()> {
        if frames == 0 {
            return Ok(());
        }
        unsafe {
            let data = self.client.GetBuffer(frames).map_err(status)?;
            let buffer = slice::from_raw_parts_mut(data, frames as usize * frame_bytes);
            fill(buffer);
            self.client.ReleaseBuffer(frames, 0).map_err(status)
        }
    }

    pub fn inner(&self) -> &IAudioRenderClient {
        &self.client
    }
}
