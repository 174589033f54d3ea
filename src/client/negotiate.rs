//! Format negotiation
//!
//! Classifies the engine's answer to "is this format acceptable" into a
//! [`FormatSupport`] outcome. Exact support, a closest-match alternative and
//! outright rejection are normal results; only unrelated engine failures
//! surface as [`Error::Engine`].

use serde::{Deserialize, Serialize};

use crate::audio::format::SampleFormat;
use crate::client::engine::{AudioEngine, FormatQuery, ShareMode};
use crate::client::status::HResult;
use crate::error::{Error, Result};

const OPERATION: &str = "IsFormatSupported";

/// Outcome of a format support query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "format", rename_all = "snake_case")]
pub enum FormatSupport {
    /// The engine accepts the format exactly
    Supported,
    /// Not accepted as is, but the engine offered this closest match
    SupportedWithAlternative(SampleFormat),
    /// Refused with no alternative
    Rejected,
}

impl FormatSupport {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }

    /// The closest match, when one was offered
    pub fn alternative(&self) -> Option<&SampleFormat> {
        match self {
            Self::SupportedWithAlternative(format) => Some(format),
            _ => None,
        }
    }
}

/// Map a raw query response to an outcome
pub fn classify(query: FormatQuery) -> Result<FormatSupport> {
    match query.status {
        HResult::S_OK => Ok(FormatSupport::Supported),
        HResult::S_FALSE => Ok(match query.closest_match {
            Some(format) => FormatSupport::SupportedWithAlternative(format),
            // Exclusive mode never offers a closest match
            None => FormatSupport::Rejected,
        }),
        HResult::AUDCLNT_E_UNSUPPORTED_FORMAT => Ok(FormatSupport::Rejected),
        status => Err(Error::engine(OPERATION, status)),
    }
}

/// Stateless format negotiation against an engine
pub struct FormatNegotiator;

impl FormatNegotiator {
    /// Full form: query the engine and classify the answer
    pub fn query<E: AudioEngine>(
        engine: &mut E,
        share_mode: ShareMode,
        format: &SampleFormat,
    ) -> Result<FormatSupport> {
        let query = engine.is_format_supported(share_mode, format);
        tracing::debug!(
            "{} format support for {}: {}",
            share_mode,
            format,
            query.status
        );

        let status = query.status;
        let outcome = classify(query);
        if outcome.is_err() {
            tracing::warn!("IsFormatSupported failed: {}", status);
        }
        outcome
    }

    /// Boolean form: true only for exact support; any alternative is discarded
    pub fn is_supported<E: AudioEngine>(
        engine: &mut E,
        share_mode: ShareMode,
        format: &SampleFormat,
    ) -> Result<bool> {
        Self::query(engine, share_mode, format).map(|support| support.is_supported())
    }
}
