//! Error types for audio client sessions

use thiserror::Error;

use crate::client::{HResult, SessionState};

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// The engine returned a non-success status where no normal outcome is defined.
    #[error("{operation} failed: engine status {status}")]
    Engine {
        operation: &'static str,
        status: HResult,
    },

    /// The operation is not allowed in the session's current state.
    #[error("{operation} is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an engine error for `operation`
    pub fn engine(operation: &'static str, status: HResult) -> Self {
        Self::Engine { operation, status }
    }

    /// The raw engine status, if this error came from the engine
    pub fn status(&self) -> Option<HResult> {
        match self {
            Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

/// Sample format description errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Format blob too short: {0} bytes")]
    Truncated(usize),

    #[error("Unsupported format tag: {0:#06x}")]
    UnsupportedTag(u16),

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
