//! Session configuration
//!
//! Loaded from `session.toml` in the platform config directory. Missing
//! files and missing keys fall back to defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::format::SampleFormat;
use crate::audio::timing::ReferenceTime;
use crate::client::engine::{ShareMode, StreamFlags};
use crate::constants::{DEFAULT_BUFFER_DURATION_MS, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::error::{Error, FormatError, Result};

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "session.toml";

/// Most channels a request may ask for; one speaker position per mask bit
pub const MAX_CHANNELS: u16 = 32;

/// Highest sample rate a request may ask for
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Requested stream layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatRequest {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    /// Request 32-bit float samples instead of integer PCM
    pub float: bool,
    /// Describe the format with a `WAVEFORMATEXTENSIBLE` header
    pub extensible: bool,
}

impl Default for FormatRequest {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: 16,
            channels: DEFAULT_CHANNELS,
            float: false,
            extensible: false,
        }
    }
}

impl FormatRequest {
    pub fn validate(&self) -> std::result::Result<(), FormatError> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(FormatError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(FormatError::InvalidChannels(self.channels));
        }
        match (self.float, self.bits_per_sample) {
            (true, 32) | (false, 8 | 16 | 24 | 32) => Ok(()),
            (_, bits) => Err(FormatError::UnsupportedBitDepth(bits)),
        }
    }

    /// Build the format to negotiate
    pub fn to_sample_format(&self) -> std::result::Result<SampleFormat, FormatError> {
        self.validate()?;
        let format = match (self.extensible, self.float) {
            (true, _) => SampleFormat::extensible(self.sample_rate, self.bits_per_sample, self.channels),
            (false, true) => SampleFormat::ieee_float(self.sample_rate, self.channels),
            (false, false) => SampleFormat::pcm(self.sample_rate, self.bits_per_sample, self.channels),
        };
        Ok(format)
    }
}

/// Parameters for opening one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub share_mode: ShareMode,
    /// Requested buffer duration in milliseconds
    pub buffer_duration_ms: u32,
    /// Scheduling period in milliseconds; 0 lets the engine pick
    pub periodicity_ms: u32,
    /// Let the engine convert from the requested format in shared mode
    pub autoconvert: bool,
    pub format: FormatRequest,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            buffer_duration_ms: DEFAULT_BUFFER_DURATION_MS,
            periodicity_ms: 0,
            autoconvert: false,
            format: FormatRequest::default(),
        }
    }
}

impl SessionConfig {
    pub fn buffer_duration(&self) -> ReferenceTime {
        ReferenceTime::from_millis(self.buffer_duration_ms as i64)
    }

    pub fn periodicity(&self) -> ReferenceTime {
        ReferenceTime::from_millis(self.periodicity_ms as i64)
    }

    pub fn stream_flags(&self) -> StreamFlags {
        if self.autoconvert {
            StreamFlags::AUTOCONVERT_PCM | StreamFlags::SRC_DEFAULT_QUALITY
        } else {
            StreamFlags::NONE
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;
        if self.buffer_duration_ms == 0 {
            return Err(Error::Config("buffer_duration_ms must be positive".into()));
        }
        if self.share_mode == ShareMode::Exclusive && self.autoconvert {
            return Err(Error::Config("autoconvert is only available in shared mode".into()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the default location, or defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                tracing::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Path of the config file for this user
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "wasapi-session").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
