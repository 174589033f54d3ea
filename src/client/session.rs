//! Audio client session lifecycle
//!
//! [`SessionController`] owns one engine connection and enforces the order
//! in which the engine may be driven:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --start--> Started
//!                                    |                   |  ^
//!                                    +------stop------>  stop start
//!                                                        v  |
//!                               reset (flush) <------ Stopped
//! ```
//!
//! Engine failures never change state. Nothing returns a session to
//! `Uninitialized`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::audio::format::SampleFormat;
use crate::audio::timing::{DevicePeriod, ReferenceTime};
use crate::client::cached::Cached;
use crate::client::engine::{AudioEngine, EngineResult, ShareMode, StreamFlags, RENDER_CLIENT_SERVICE};
use crate::client::negotiate::{FormatNegotiator, FormatSupport};
use crate::client::render::RenderTransfer;
use crate::error::{Error, Result};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

impl SessionState {
    pub fn is_initialized(self) -> bool {
        self != Self::Uninitialized
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Stateful wrapper around one engine connection
pub struct SessionController<E: AudioEngine> {
    engine: E,
    state: SessionState,
    share_mode: Option<ShareMode>,
    active_format: Option<SampleFormat>,
    mix_format: Cached<SampleFormat>,
}

impl<E: AudioEngine> SessionController<E> {
    /// Take ownership of an opened, not yet initialized engine connection
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: SessionState::Uninitialized,
            share_mode: None,
            active_format: None,
            mix_format: Cached::empty(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Share mode fixed by a successful initialize
    pub fn share_mode(&self) -> Option<ShareMode> {
        self.share_mode
    }

    /// Format the stream was initialized with
    pub fn active_format(&self) -> Option<&SampleFormat> {
        self.active_format.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The engine's natural format.
    ///
    /// Queried once and cached until the next successful initialize.
    pub fn mix_format(&mut self) -> Result<SampleFormat> {
        if let Some(format) = self.mix_format.get() {
            tracing::debug!("Mix format cache hit: {}", format);
            return Ok(*format);
        }

        let engine = &mut self.engine;
        let format = self
            .mix_format
            .get_or_try_init(|| check("GetMixFormat", engine.get_mix_format()))?;
        tracing::debug!("Mix format from engine: {}", format);
        Ok(*format)
    }

    /// Full negotiation outcome for `format` under `share_mode`
    pub fn format_support(
        &mut self,
        share_mode: ShareMode,
        format: &SampleFormat,
    ) -> Result<FormatSupport> {
        FormatNegotiator::query(&mut self.engine, share_mode, format)
    }

    /// True only when the engine accepts `format` exactly
    pub fn is_format_supported(&mut self, share_mode: ShareMode, format: &SampleFormat) -> Result<bool> {
        FormatNegotiator::is_supported(&mut self.engine, share_mode, format)
    }

    /// Set up the stream.
    ///
    /// Durations are in 100 ns ticks; pass [`Uuid::nil`] when the session
    /// does not join a grouping. `format` should already have been accepted
    /// by [`Self::is_format_supported`].
    pub fn initialize(
        &mut self,
        share_mode: ShareMode,
        flags: StreamFlags,
        buffer_duration: ReferenceTime,
        periodicity: ReferenceTime,
        format: &SampleFormat,
        session_id: Uuid,
    ) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(self.invalid_state("Initialize"));
        }

        tracing::debug!(
            "Initializing {} session: {}, buffer {}, period {}, flags {:#x}",
            share_mode,
            format,
            buffer_duration,
            periodicity,
            flags.bits()
        );

        check(
            "Initialize",
            self.engine.initialize(
                share_mode,
                flags,
                buffer_duration,
                periodicity,
                format,
                &session_id,
            ),
        )?;

        // The engine may report a different natural format from now on.
        self.mix_format.invalidate();
        self.share_mode = Some(share_mode);
        self.active_format = Some(*format);
        self.transition(SessionState::Initialized);
        Ok(())
    }

    /// Allocated buffer size in frames
    pub fn buffer_size(&mut self) -> Result<u32> {
        self.require_initialized("GetBufferSize")?;
        check("GetBufferSize", self.engine.get_buffer_size())
    }

    /// Allocated buffer size as a duration at the active sample rate
    pub fn buffer_duration(&mut self) -> Result<ReferenceTime> {
        let frames = self.buffer_size()?;
        let rate = self.active_format.map(|f| f.sample_rate()).unwrap_or(0);
        Ok(ReferenceTime::from_frames(frames, rate))
    }

    /// Frames queued and not yet consumed by the hardware
    pub fn current_padding(&mut self) -> Result<u32> {
        self.require_initialized("GetCurrentPadding")?;
        check("GetCurrentPadding", self.engine.get_current_padding())
    }

    /// Maximum latency of the initialized stream
    pub fn stream_latency(&mut self) -> Result<ReferenceTime> {
        self.require_initialized("GetStreamLatency")?;
        check("GetStreamLatency", self.engine.get_stream_latency())
    }

    /// Default and minimum periods from a single engine query
    pub fn device_period(&mut self) -> Result<DevicePeriod> {
        check("GetDevicePeriod", self.engine.get_device_period())
    }

    pub fn default_device_period(&mut self) -> Result<ReferenceTime> {
        self.device_period().map(|period| period.default)
    }

    pub fn minimum_device_period(&mut self) -> Result<ReferenceTime> {
        self.device_period().map(|period| period.minimum)
    }

    /// Resolve the render transfer service of the initialized stream
    pub fn acquire_render_transfer(&mut self) -> Result<RenderTransfer<E::RenderService>> {
        self.require_initialized("GetService")?;
        let service = check("GetService", self.engine.get_service(&RENDER_CLIENT_SERVICE))?;
        let buffer_frames = check("GetBufferSize", self.engine.get_buffer_size())?;
        let format = match self.active_format {
            Some(format) => format,
            None => return Err(self.invalid_state("GetService")),
        };
        Ok(RenderTransfer::new(service, buffer_frames, format))
    }

    pub fn start(&mut self) -> Result<()> {
        self.require_initialized("Start")?;
        check("Start", self.engine.start())?;
        self.transition(SessionState::Started);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.require_initialized("Stop")?;
        check("Stop", self.engine.stop())?;
        self.transition(SessionState::Stopped);
        Ok(())
    }

    /// Flush pending data and rewind the stream clock; the stream must be stopped
    pub fn reset(&mut self) -> Result<()> {
        self.require_initialized("Reset")?;
        check("Reset", self.engine.reset())?;
        tracing::info!("Session reset, pending frames flushed");
        Ok(())
    }

    /// Move into a mutex for use from several threads
    pub fn into_shared(self) -> SharedSession<E> {
        create_shared_session(self)
    }

    fn require_initialized(&self, operation: &'static str) -> Result<()> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        tracing::warn!("{} rejected: session is {}", operation, self.state);
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!("Session {} -> {}", self.state, next);
        }
        self.state = next;
    }
}

impl<E: AudioEngine> fmt::Debug for SessionController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("share_mode", &self.share_mode)
            .field("active_format", &self.active_format)
            .field("mix_format", &self.mix_format.get())
            .finish()
    }
}

fn check<T>(operation: &'static str, result: EngineResult<T>) -> Result<T> {
    result.map_err(|status| {
        tracing::warn!("{} failed: {}", operation, status);
        Error::engine(operation, status)
    })
}

/// Thread-safe handle to a session; every call is serialized by the mutex
pub type SharedSession<E> = Arc<Mutex<SessionController<E>>>;

/// Wrap a session for shared use
pub fn create_shared_session<E: AudioEngine>(session: SessionController<E>) -> SharedSession<E> {
    Arc::new(Mutex::new(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::simulated::{EngineCall, SimulatedConfig, SimulatedEngine};
    use crate::client::status::HResult;

    fn stereo_float() -> SampleFormat {
        SampleFormat::extensible(48000, 32, 2)
    }

    fn session() -> (SessionController<SimulatedEngine>, SimulatedEngine) {
        session_with(SimulatedConfig::default())
    }

    fn session_with(config: SimulatedConfig) -> (SessionController<SimulatedEngine>, SimulatedEngine) {
        let engine = SimulatedEngine::new(config);
        let endpoint = engine.clone();
        (SessionController::new(engine), endpoint)
    }

    fn init_shared(session: &mut SessionController<SimulatedEngine>, format: &SampleFormat) -> Result<()> {
        session.initialize(
            ShareMode::Shared,
            StreamFlags::NONE,
            ReferenceTime::from_millis(100),
            ReferenceTime::ZERO,
            format,
            Uuid::nil(),
        )
    }

    #[test]
    fn test_queries_fail_before_initialize() {
        let (mut session, endpoint) = session();

        let err = session.buffer_size().unwrap_err();
        assert!(err.is_invalid_state());
        assert!(session.current_padding().unwrap_err().is_invalid_state());
        assert!(session.stream_latency().unwrap_err().is_invalid_state());
        assert!(session.acquire_render_transfer().unwrap_err().is_invalid_state());
        assert!(session.start().unwrap_err().is_invalid_state());
        assert!(session.stop().unwrap_err().is_invalid_state());
        assert!(session.reset().unwrap_err().is_invalid_state());

        // Rejected locally, the engine was never asked
        assert_eq!(endpoint.call_count(EngineCall::GetBufferSize), 0);
        assert_eq!(endpoint.call_count(EngineCall::GetService), 0);
        assert_eq!(endpoint.call_count(EngineCall::Start), 0);
        assert_eq!(endpoint.call_count(EngineCall::Stop), 0);
        assert_eq!(endpoint.call_count(EngineCall::Reset), 0);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_stop_without_start() {
        let (mut session, endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(endpoint.call_count(EngineCall::Stop), 1);

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.current_padding().unwrap(), 0);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
    }

    #[test]
    fn test_mix_format_cached() {
        let (mut session, endpoint) = session_with(SimulatedConfig {
            mix_format: SampleFormat::extensible(48000, 24, 2),
            ..SimulatedConfig::default()
        });

        let first = session.mix_format().unwrap();
        let second = session.mix_format().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.sample_rate(), 48000);
        assert_eq!(first.bits_per_sample(), 24);
        assert_eq!(first.channels(), 2);
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 1);
    }

    #[test]
    fn test_mix_format_decoded_over_template() {
        let template = SampleFormat::mix_format_template();
        let (mut session, endpoint) = session_with(SimulatedConfig {
            mix_format: SampleFormat::pcm(48000, 24, 2),
            ..SimulatedConfig::default()
        });

        let mix = session.mix_format().unwrap();

        // Every field the plain blob carries replaces the 44100/32/2 template
        assert_ne!(mix.sample_rate(), template.sample_rate());
        assert_ne!(mix.bits_per_sample(), template.bits_per_sample());
        assert_eq!(mix, SampleFormat::pcm(48000, 24, 2));
        assert!(!mix.is_extensible());
        assert_eq!(mix.channel_mask(), None);
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 1);
    }

    #[test]
    fn test_mix_format_failure_not_cached() {
        let (mut session, endpoint) = session();
        endpoint.fail_next(EngineCall::GetMixFormat, HResult::AUDCLNT_E_DEVICE_INVALIDATED);

        let err = session.mix_format().unwrap_err();
        assert_eq!(err.status(), Some(HResult::AUDCLNT_E_DEVICE_INVALIDATED));
        assert!(session.mix_format().is_ok());
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 2);
    }

    #[test]
    fn test_initialize_requeries_mix_format() {
        let post_init = SampleFormat::extensible(44100, 32, 2);
        let (mut session, endpoint) = session_with(SimulatedConfig {
            initialized_mix_format: Some(post_init),
            ..SimulatedConfig::default()
        });

        let before = session.mix_format().unwrap();
        assert_eq!(before, stereo_float());

        init_shared(&mut session, &stereo_float()).unwrap();
        let after = session.mix_format().unwrap();

        assert_eq!(after, post_init);
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 2);
    }

    #[test]
    fn test_alternate_then_initialize_clears_cache() {
        let (mut session, endpoint) = session();
        let request = SampleFormat::pcm(48000, 16, 2);

        session.mix_format().unwrap();
        let support = session.format_support(ShareMode::Shared, &request).unwrap();
        assert_eq!(support, FormatSupport::SupportedWithAlternative(stereo_float()));

        session
            .initialize(
                ShareMode::Shared,
                StreamFlags::AUTOCONVERT_PCM | StreamFlags::SRC_DEFAULT_QUALITY,
                ReferenceTime::from_millis(50),
                ReferenceTime::ZERO,
                &request,
                Uuid::nil(),
            )
            .unwrap();
        assert_eq!(session.active_format(), Some(&request));
        assert_eq!(session.share_mode(), Some(ShareMode::Shared));

        session.mix_format().unwrap();
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 2);
    }

    #[test]
    fn test_failed_initialize_keeps_state() {
        let (mut session, endpoint) = session();
        session.mix_format().unwrap();

        let err = init_shared(&mut session, &SampleFormat::pcm(44100, 16, 2)).unwrap_err();
        assert_eq!(err.status(), Some(HResult::AUDCLNT_E_UNSUPPORTED_FORMAT));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.share_mode(), None);

        // Cache survives a failed initialize
        session.mix_format().unwrap();
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 1);

        // Renegotiated retry succeeds
        init_shared(&mut session, &stereo_float()).unwrap();
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn test_repeated_initialize_rejected() {
        let (mut session, endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();

        let err = init_shared(&mut session, &stereo_float()).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(endpoint.call_count(EngineCall::Initialize), 1);
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn test_device_period_single_query() {
        let (mut session, endpoint) = session_with(SimulatedConfig {
            device_period: DevicePeriod {
                default: ReferenceTime(100_000),
                minimum: ReferenceTime(30_000),
            },
            ..SimulatedConfig::default()
        });

        let period = session.device_period().unwrap();
        assert_eq!(period.default, ReferenceTime(100_000));
        assert_eq!(period.minimum, ReferenceTime(30_000));
        assert_eq!(endpoint.call_count(EngineCall::GetDevicePeriod), 1);

        assert_eq!(session.default_device_period().unwrap(), ReferenceTime(100_000));
        assert_eq!(endpoint.call_count(EngineCall::GetDevicePeriod), 2);
        assert_eq!(session.minimum_device_period().unwrap(), ReferenceTime(30_000));
        assert_eq!(endpoint.call_count(EngineCall::GetDevicePeriod), 3);
    }

    #[test]
    fn test_lifecycle_and_flush() {
        let (mut session, endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();
        assert_eq!(session.buffer_size().unwrap(), 4800);
        assert_eq!(session.buffer_duration().unwrap(), ReferenceTime::from_millis(100));

        let transfer = session.acquire_render_transfer().unwrap();
        assert_eq!(transfer.buffer_frames(), 4800);
        assert_eq!(transfer.frame_bytes(), 8);
        transfer.service().write_frames(960).unwrap();
        assert_eq!(session.current_padding().unwrap(), 960);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(endpoint.advance(480), 480);

        // Reset refused while running, state untouched
        let err = session.reset().unwrap_err();
        assert_eq!(err.status(), Some(HResult::AUDCLNT_E_NOT_STOPPED));
        assert_eq!(session.state(), SessionState::Started);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.current_padding().unwrap(), 480);

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.current_padding().unwrap(), 0);
        assert_eq!(endpoint.position(), 0);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
    }

    #[test]
    fn test_start_twice_is_engine_error() {
        let (mut session, _endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();
        session.start().unwrap();

        let err = session.start().unwrap_err();
        assert_eq!(err.status(), Some(HResult::AUDCLNT_E_NOT_STOPPED));
        assert_eq!(session.state(), SessionState::Started);
    }

    #[test]
    fn test_reset_before_start() {
        let (mut session, _endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn test_engine_error_leaves_state() {
        let (mut session, endpoint) = session();
        init_shared(&mut session, &stereo_float()).unwrap();
        endpoint.fail_next(EngineCall::Start, HResult::AUDCLNT_E_DEVICE_INVALIDATED);

        let err = session.start().unwrap_err();
        assert!(matches!(err, Error::Engine { operation: "Start", .. }));
        assert_eq!(session.state(), SessionState::Initialized);
        assert!(!endpoint.is_running());
    }

    #[test]
    fn test_exclusive_negotiation() {
        let (mut session, _endpoint) = session();
        let request = SampleFormat::pcm(48000, 24, 2);

        assert!(session.is_format_supported(ShareMode::Exclusive, &request).unwrap());
        assert!(!session
            .is_format_supported(ShareMode::Exclusive, &SampleFormat::pcm(96000, 24, 2))
            .unwrap());

        session
            .initialize(
                ShareMode::Exclusive,
                StreamFlags::NONE,
                ReferenceTime::from_millis(10),
                ReferenceTime::from_millis(10),
                &request,
                Uuid::new_v4(),
            )
            .unwrap();
        assert_eq!(session.share_mode(), Some(ShareMode::Exclusive));
        assert_eq!(session.buffer_size().unwrap(), 480);
        assert_eq!(session.stream_latency().unwrap(), ReferenceTime::from_millis(10));
    }

    #[test]
    fn test_shared_session_serializes_calls() {
        let (session, endpoint) = session();
        let shared = session.into_shared();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.lock().mix_format().map(|f| f.sample_rate()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 48000);
        }
        assert_eq!(endpoint.call_count(EngineCall::GetMixFormat), 1);
    }
}
