//! # WASAPI Session
//!
//! Low-latency audio client sessions: negotiate a sample format with the
//! audio engine, initialize a hardware-backed buffer, query timing, and drive
//! the stream through start/stop/reset.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Application                            │
//! │      picks a format, buffer duration, periodicity, share mode    │
//! └───────────────┬───────────────────────────────┬──────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌───────────────────────────────┐  ┌───────────────────────────────┐
//! │  FormatNegotiator             │  │  SessionController            │
//! │  (client::negotiate)          │  │  (client::session)            │
//! │                               │  │                               │
//! │  S_OK        -> Supported     │  │  Uninitialized                │
//! │  S_FALSE     -> Alternative   │  │     │ initialize              │
//! │  UNSUPPORTED -> Rejected      │  │     ▼                         │
//! │  other       -> Error         │  │  Initialized ──start──┐       │
//! └───────────────┬───────────────┘  │     ▲                 ▼       │
//!                 │                  │  Stopped ◄──stop── Started    │
//!                 │                  │  (reset flushes)              │
//!                 │                  │  cached mix format            │
//!                 │                  └───────────────┬───────────────┘
//!                 │                                  │
//!                 ▼                                  ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     trait AudioEngine (client::engine)           │
//! ├───────────────────────────────┬──────────────────────────────────┤
//! │  WasapiEngine (Windows)       │  SimulatedEngine (portable)      │
//! │  IAudioClient                 │  software endpoint               │
//! └───────────────────────────────┴──────────────────────────────────┘
//!                                  │
//!                                  ▼
//!                   RenderTransfer ─► render side
//! ```
//!
//! ## Example
//!
//! ```
//! use wasapi_session::audio::{ReferenceTime, SampleFormat};
//! use wasapi_session::client::{SessionController, ShareMode, SimulatedEngine, StreamFlags};
//!
//! # fn main() -> wasapi_session::Result<()> {
//! let mut session = SessionController::new(SimulatedEngine::default());
//! let format = session.mix_format()?;
//!
//! if session.is_format_supported(ShareMode::Shared, &format)? {
//!     session.initialize(
//!         ShareMode::Shared,
//!         StreamFlags::NONE,
//!         ReferenceTime::from_millis(100),
//!         ReferenceTime::ZERO,
//!         &format,
//!         uuid::Uuid::nil(),
//!     )?;
//!     session.start()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod client;
pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for requested formats
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default requested buffer duration in milliseconds
    pub const DEFAULT_BUFFER_DURATION_MS: u32 = 100;
}
