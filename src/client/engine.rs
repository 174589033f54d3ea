//! The call contract against the audio engine
//!
//! [`AudioEngine`] is the per-call surface of one opened endpoint connection.
//! Platform implementations live next to this module: [`super::wasapi`] on
//! Windows and [`super::simulated`] everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use uuid::Uuid;

use crate::audio::format::SampleFormat;
use crate::audio::timing::{DevicePeriod, ReferenceTime};
use crate::client::status::HResult;

/// Result of a fallible engine call
pub type EngineResult<T> = std::result::Result<T, HResult>;

/// Service id of the render transfer interface (`IAudioRenderClient`)
pub const RENDER_CLIENT_SERVICE: Uuid = Uuid::from_u128(0xF294ACFC_3146_4483_A7BF_ADDCA7C260E2);

/// Whether the session shares the endpoint through the system mixer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareMode {
    /// Mixed with other sessions by the engine
    #[default]
    Shared,
    /// Direct hardware access, lowest latency
    Exclusive,
}

impl fmt::Display for ShareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Stream behavior flags passed to initialize (`AUDCLNT_STREAMFLAGS_*`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamFlags(pub u32);

impl StreamFlags {
    pub const NONE: Self = Self(0);
    /// Session is not persisted across restarts of the engine
    pub const NO_PERSIST: Self = Self(0x0008_0000);
    /// Use default-quality sample rate conversion
    pub const SRC_DEFAULT_QUALITY: Self = Self(0x0800_0000);
    /// Insert a channel matrixer and sample rate converter in shared mode
    pub const AUTOCONVERT_PCM: Self = Self(0x8000_0000);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StreamFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Raw response to a format support query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatQuery {
    pub status: HResult,
    /// Closest match offered by the engine, shared mode only
    pub closest_match: Option<SampleFormat>,
}

impl FormatQuery {
    pub fn new(status: HResult, closest_match: Option<SampleFormat>) -> Self {
        Self {
            status,
            closest_match,
        }
    }
}

/// One opened connection to an audio endpoint
///
/// Methods mirror the engine's calls one to one. Ordering rules are not
/// enforced here; [`super::SessionController`] owns that.
pub trait AudioEngine {
    /// Handle returned for [`RENDER_CLIENT_SERVICE`]
    type RenderService;

    /// Current natural format of the endpoint
    fn get_mix_format(&mut self) -> EngineResult<SampleFormat>;

    fn initialize(
        &mut self,
        share_mode: ShareMode,
        flags: StreamFlags,
        buffer_duration: ReferenceTime,
        periodicity: ReferenceTime,
        format: &SampleFormat,
        session_id: &Uuid,
    ) -> EngineResult<()>;

    /// Allocated buffer size in frames
    fn get_buffer_size(&mut self) -> EngineResult<u32>;

    fn get_stream_latency(&mut self) -> EngineResult<ReferenceTime>;

    /// Frames queued and not yet consumed
    fn get_current_padding(&mut self) -> EngineResult<u32>;

    /// Default and minimum periods in one query
    fn get_device_period(&mut self) -> EngineResult<DevicePeriod>;

    fn is_format_supported(&mut self, share_mode: ShareMode, format: &SampleFormat) -> FormatQuery;

    fn get_service(&mut self, service_id: &Uuid) -> EngineResult<Self::RenderService>;

    fn start(&mut self) -> EngineResult<()>;

    fn stop(&mut self) -> EngineResult<()>;

    fn reset(&mut self) -> EngineResult<()>;
}
