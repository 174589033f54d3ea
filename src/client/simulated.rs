//! Software endpoint that follows the engine's ordering rules
//!
//! [`SimulatedEngine`] answers every call the way a shared/exclusive output
//! endpoint would: it refuses buffer queries before initialize, offers the mix
//! format as closest match in shared mode, rejects reset while running and
//! flushes queued frames on reset. It counts calls per operation and supports
//! one-shot fault injection, so it doubles as the engine behind unit tests
//! and the probe on machines without WASAPI.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::audio::format::SampleFormat;
use crate::audio::timing::{DevicePeriod, ReferenceTime};
use crate::client::engine::{
    AudioEngine, EngineResult, FormatQuery, ShareMode, StreamFlags, RENDER_CLIENT_SERVICE,
};
use crate::client::status::HResult;

/// Longest exclusive-mode buffer the endpoint accepts (2 s)
const MAX_EXCLUSIVE_BUFFER: ReferenceTime = ReferenceTime::from_millis(2000);

/// Engine operations, for call counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    GetMixFormat,
    Initialize,
    GetBufferSize,
    GetStreamLatency,
    GetCurrentPadding,
    GetDevicePeriod,
    IsFormatSupported,
    GetService,
    Start,
    Stop,
    Reset,
}

/// Endpoint description
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Natural format before any stream is initialized
    pub mix_format: SampleFormat,
    /// Natural format reported once a stream is initialized, if it differs
    pub initialized_mix_format: Option<SampleFormat>,
    pub device_period: DevicePeriod,
    /// Formats the hardware accepts in exclusive mode
    pub exclusive_formats: Vec<SampleFormat>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            mix_format: SampleFormat::extensible(48000, 32, 2),
            initialized_mix_format: None,
            device_period: DevicePeriod {
                default: ReferenceTime(100_000),
                minimum: ReferenceTime(30_000),
            },
            exclusive_formats: vec![
                SampleFormat::extensible(48000, 16, 2),
                SampleFormat::extensible(48000, 24, 2),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveStream {
    share_mode: ShareMode,
    format: SampleFormat,
    buffer_frames: u32,
    latency: ReferenceTime,
}

#[derive(Debug)]
struct SimState {
    config: SimulatedConfig,
    stream: Option<ActiveStream>,
    running: bool,
    padding: u32,
    position: u64,
    calls: HashMap<EngineCall, usize>,
    faults: HashMap<EngineCall, HResult>,
}

impl SimState {
    /// Count the call and return an injected failure, if any
    fn enter(&mut self, call: EngineCall) -> EngineResult<()> {
        *self.calls.entry(call).or_insert(0) += 1;
        match self.faults.remove(&call) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn stream(&self) -> EngineResult<ActiveStream> {
        self.stream.ok_or(HResult::AUDCLNT_E_NOT_INITIALIZED)
    }

    fn current_mix_format(&self) -> SampleFormat {
        match (self.stream, self.config.initialized_mix_format) {
            (Some(_), Some(format)) => format,
            _ => self.config.mix_format,
        }
    }

    fn accepts_exclusive(&self, format: &SampleFormat) -> bool {
        self.config
            .exclusive_formats
            .iter()
            .any(|f| f.is_equivalent(format))
    }
}

/// A simulated output endpoint
///
/// Clones share the same endpoint, so a clone kept aside can observe a
/// session that owns the original.
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                config,
                stream: None,
                running: false,
                padding: 0,
                position: 0,
                calls: HashMap::new(),
                faults: HashMap::new(),
            })),
        }
    }

    /// Number of times `call` reached the engine
    pub fn call_count(&self, call: EngineCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Make the next `call` fail with `status`
    pub fn fail_next(&self, call: EngineCall, status: HResult) {
        self.state.lock().faults.insert(call, status);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Frames played since the last reset
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// Let the hardware consume up to `frames` queued frames; returns the
    /// number consumed. Nothing moves while the stream is stopped.
    pub fn advance(&self, frames: u32) -> u32 {
        let mut state = self.state.lock();
        if !state.running {
            return 0;
        }
        let consumed = frames.min(state.padding);
        state.padding -= consumed;
        state.position += consumed as u64;
        consumed
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl AudioEngine for SimulatedEngine {
    type RenderService = SimulatedRenderClient;

    fn get_mix_format(&mut self) -> EngineResult<SampleFormat> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetMixFormat)?;
        // Handed out as a blob and decoded over the template, like the real engine
        let blob = state.current_mix_format().to_wave_format_bytes();
        SampleFormat::from_wave_format_bytes(&blob).map_err(|e| {
            tracing::warn!("Simulated mix format is not decodable: {}", e);
            HResult::E_INVALIDARG
        })
    }

    fn initialize(
        &mut self,
        share_mode: ShareMode,
        flags: StreamFlags,
        buffer_duration: ReferenceTime,
        periodicity: ReferenceTime,
        format: &SampleFormat,
        _session_id: &Uuid,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.enter(EngineCall::Initialize)?;

        if state.stream.is_some() {
            return Err(HResult::AUDCLNT_E_ALREADY_INITIALIZED);
        }
        if format.channels() == 0 || format.sample_rate() == 0 || buffer_duration.ticks() < 0 {
            return Err(HResult::E_INVALIDARG);
        }

        let period = state.config.device_period;
        let (buffer, latency) = match share_mode {
            ShareMode::Shared => {
                let mix = state.current_mix_format();
                if !format.is_equivalent(&mix) && !flags.contains(StreamFlags::AUTOCONVERT_PCM) {
                    return Err(HResult::AUDCLNT_E_UNSUPPORTED_FORMAT);
                }
                (buffer_duration.max(period.default), period.default)
            }
            ShareMode::Exclusive => {
                if !state.accepts_exclusive(format) {
                    return Err(HResult::AUDCLNT_E_UNSUPPORTED_FORMAT);
                }
                let requested = if periodicity.is_zero() {
                    period.default
                } else {
                    periodicity
                };
                if requested < period.minimum {
                    return Err(HResult::AUDCLNT_E_INVALID_DEVICE_PERIOD);
                }
                let buffer = buffer_duration.max(requested);
                if buffer > MAX_EXCLUSIVE_BUFFER {
                    return Err(HResult::AUDCLNT_E_BUFFER_SIZE_ERROR);
                }
                (buffer, requested)
            }
        };

        state.stream = Some(ActiveStream {
            share_mode,
            format: *format,
            buffer_frames: buffer.to_frames(format.sample_rate()),
            latency,
        });
        Ok(())
    }

    fn get_buffer_size(&mut self) -> EngineResult<u32> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetBufferSize)?;
        Ok(state.stream()?.buffer_frames)
    }

    fn get_stream_latency(&mut self) -> EngineResult<ReferenceTime> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetStreamLatency)?;
        Ok(state.stream()?.latency)
    }

    fn get_current_padding(&mut self) -> EngineResult<u32> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetCurrentPadding)?;
        state.stream()?;
        Ok(state.padding)
    }

    fn get_device_period(&mut self) -> EngineResult<DevicePeriod> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetDevicePeriod)?;
        Ok(state.config.device_period)
    }

    fn is_format_supported(&mut self, share_mode: ShareMode, format: &SampleFormat) -> FormatQuery {
        let mut state = self.state.lock();
        if let Err(status) = state.enter(EngineCall::IsFormatSupported) {
            return FormatQuery::new(status, None);
        }
        if format.channels() == 0 || format.sample_rate() == 0 {
            return FormatQuery::new(HResult::E_INVALIDARG, None);
        }

        match share_mode {
            ShareMode::Shared => {
                let mix = state.current_mix_format();
                if format.is_equivalent(&mix) {
                    FormatQuery::new(HResult::S_OK, None)
                } else {
                    FormatQuery::new(HResult::S_FALSE, Some(mix))
                }
            }
            ShareMode::Exclusive => {
                if state.accepts_exclusive(format) {
                    FormatQuery::new(HResult::S_OK, None)
                } else {
                    FormatQuery::new(HResult::AUDCLNT_E_UNSUPPORTED_FORMAT, None)
                }
            }
        }
    }

    fn get_service(&mut self, service_id: &Uuid) -> EngineResult<SimulatedRenderClient> {
        let mut state = self.state.lock();
        state.enter(EngineCall::GetService)?;
        state.stream()?;
        if *service_id != RENDER_CLIENT_SERVICE {
            return Err(HResult::E_NOINTERFACE);
        }
        Ok(SimulatedRenderClient {
            state: Arc::clone(&self.state),
        })
    }

    fn start(&mut self) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.enter(EngineCall::Start)?;
        state.stream()?;
        if state.running {
            return Err(HResult::AUDCLNT_E_NOT_STOPPED);
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.enter(EngineCall::Stop)?;
        state.stream()?;
        // Stopping a stopped stream succeeds (S_FALSE)
        state.running = false;
        Ok(())
    }

    fn reset(&mut self) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.enter(EngineCall::Reset)?;
        state.stream()?;
        if state.running {
            return Err(HResult::AUDCLNT_E_NOT_STOPPED);
        }
        state.padding = 0;
        state.position = 0;
        Ok(())
    }
}

/// Render service handed out by [`SimulatedEngine`]
#[derive(Debug)]
pub struct SimulatedRenderClient {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedRenderClient {
    /// Frames that can be written without overrunning the buffer
    pub fn frames_available(&self) -> u32 {
        let state = self.state.lock();
        match state.stream {
            Some(stream) => stream.buffer_frames.saturating_sub(state.padding),
            None => 0,
        }
    }

    /// Queue `frames` frames behind the current padding
    pub fn write_frames(&self, frames: u32) -> EngineResult<()> {
        let mut state = self.state.lock();
        let stream = state.stream()?;
        if frames > stream.buffer_frames.saturating_sub(state.padding) {
            return Err(HResult::AUDCLNT_E_BUFFER_TOO_LARGE);
        }
        state.padding += frames;
        Ok(())
    }

    /// Layout of the frames this client writes
    pub fn format(&self) -> Option<SampleFormat> {
        self.state.lock().stream.map(|stream| stream.format)
    }

    pub fn share_mode(&self) -> Option<ShareMode> {
        self.state.lock().stream.map(|stream| stream.share_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> SimulatedEngine {
        let mut engine = SimulatedEngine::default();
        let format = SampleFormat::extensible(48000, 32, 2);
        engine
            .initialize(
                ShareMode::Shared,
                StreamFlags::NONE,
                ReferenceTime::from_millis(100),
                ReferenceTime::ZERO,
                &format,
                &Uuid::nil(),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_queries_before_initialize() {
        let mut engine = SimulatedEngine::default();
        assert_eq!(engine.get_buffer_size(), Err(HResult::AUDCLNT_E_NOT_INITIALIZED));
        assert_eq!(engine.get_current_padding(), Err(HResult::AUDCLNT_E_NOT_INITIALIZED));
        assert_eq!(engine.start(), Err(HResult::AUDCLNT_E_NOT_INITIALIZED));
        assert!(engine.get_device_period().is_ok());
        assert!(engine.get_mix_format().is_ok());
    }

    #[test]
    fn test_shared_buffer_sizing() {
        let mut engine = initialized();
        // 100 ms at 48 kHz
        assert_eq!(engine.get_buffer_size(), Ok(4800));
        assert_eq!(engine.get_stream_latency(), Ok(ReferenceTime(100_000)));
    }

    #[test]
    fn test_exclusive_rules() {
        let mut engine = SimulatedEngine::default();
        let format = SampleFormat::pcm(48000, 24, 2);

        let too_short = engine.initialize(
            ShareMode::Exclusive,
            StreamFlags::NONE,
            ReferenceTime(20_000),
            ReferenceTime(20_000),
            &format,
            &Uuid::nil(),
        );
        assert_eq!(too_short, Err(HResult::AUDCLNT_E_INVALID_DEVICE_PERIOD));

        let too_long = engine.initialize(
            ShareMode::Exclusive,
            StreamFlags::NONE,
            ReferenceTime::from_millis(5000),
            ReferenceTime::ZERO,
            &format,
            &Uuid::nil(),
        );
        assert_eq!(too_long, Err(HResult::AUDCLNT_E_BUFFER_SIZE_ERROR));

        engine
            .initialize(
                ShareMode::Exclusive,
                StreamFlags::NONE,
                ReferenceTime(30_000),
                ReferenceTime(30_000),
                &format,
                &Uuid::nil(),
            )
            .unwrap();
        assert_eq!(engine.get_buffer_size(), Ok(144));
    }

    #[test]
    fn test_render_client_padding() {
        let mut engine = initialized();
        let client = engine.get_service(&RENDER_CLIENT_SERVICE).unwrap();
        assert_eq!(client.frames_available(), 4800);

        client.write_frames(1000).unwrap();
        assert_eq!(engine.get_current_padding(), Ok(1000));
        assert_eq!(client.write_frames(4000), Err(HResult::AUDCLNT_E_BUFFER_TOO_LARGE));

        // Stopped streams do not drain
        assert_eq!(engine.advance(500), 0);
        engine.start().unwrap();
        assert_eq!(engine.advance(400), 400);
        assert_eq!(engine.get_current_padding(), Ok(600));
        assert_eq!(engine.position(), 400);
    }

    #[test]
    fn test_unknown_service() {
        let mut engine = initialized();
        let err = engine.get_service(&Uuid::nil()).unwrap_err();
        assert_eq!(err, HResult::E_NOINTERFACE);
    }

    #[test]
    fn test_fault_injection_is_one_shot() {
        let mut engine = SimulatedEngine::default();
        engine.fail_next(EngineCall::GetDevicePeriod, HResult::AUDCLNT_E_DEVICE_INVALIDATED);
        assert_eq!(engine.get_device_period(), Err(HResult::AUDCLNT_E_DEVICE_INVALIDATED));
        assert!(engine.get_device_period().is_ok());
        assert_eq!(engine.call_count(EngineCall::GetDevicePeriod), 2);
    }
}
