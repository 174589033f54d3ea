//! Engine status codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw engine status code (`HRESULT`)
///
/// Negative values are failures; zero and positive values are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HResult(pub i32);

const fn code(value: u32) -> HResult {
    HResult(value as i32)
}

impl HResult {
    pub const S_OK: Self = code(0x0000_0000);
    pub const S_FALSE: Self = code(0x0000_0001);

    pub const E_NOINTERFACE: Self = code(0x8000_4002);
    pub const E_POINTER: Self = code(0x8000_4003);
    pub const E_OUTOFMEMORY: Self = code(0x8007_000E);
    pub const E_INVALIDARG: Self = code(0x8007_0057);

    pub const AUDCLNT_E_NOT_INITIALIZED: Self = code(0x8889_0001);
    pub const AUDCLNT_E_ALREADY_INITIALIZED: Self = code(0x8889_0002);
    pub const AUDCLNT_E_WRONG_ENDPOINT_TYPE: Self = code(0x8889_0003);
    pub const AUDCLNT_E_DEVICE_INVALIDATED: Self = code(0x8889_0004);
    pub const AUDCLNT_E_NOT_STOPPED: Self = code(0x8889_0005);
    pub const AUDCLNT_E_BUFFER_TOO_LARGE: Self = code(0x8889_0006);
    pub const AUDCLNT_E_OUT_OF_ORDER: Self = code(0x8889_0007);
    pub const AUDCLNT_E_UNSUPPORTED_FORMAT: Self = code(0x8889_0008);
    pub const AUDCLNT_E_INVALID_SIZE: Self = code(0x8889_0009);
    pub const AUDCLNT_E_DEVICE_IN_USE: Self = code(0x8889_000A);
    pub const AUDCLNT_E_BUFFER_OPERATION_PENDING: Self = code(0x8889_000B);
    pub const AUDCLNT_E_EXCLUSIVE_MODE_NOT_ALLOWED: Self = code(0x8889_000E);
    pub const AUDCLNT_E_SERVICE_NOT_RUNNING: Self = code(0x8889_0010);
    pub const AUDCLNT_E_BUFFER_SIZE_ERROR: Self = code(0x8889_0016);
    pub const AUDCLNT_E_BUFFER_SIZE_NOT_ALIGNED: Self = code(0x8889_0019);
    pub const AUDCLNT_E_INVALID_DEVICE_PERIOD: Self = code(0x8889_0020);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Convert to a `Result`, keeping the status on failure
    pub fn ok(self) -> Result<(), HResult> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Symbolic name for the well-known audio client codes
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::AUDCLNT_E_NOT_INITIALIZED => "AUDCLNT_E_NOT_INITIALIZED",
            Self::AUDCLNT_E_ALREADY_INITIALIZED => "AUDCLNT_E_ALREADY_INITIALIZED",
            Self::AUDCLNT_E_WRONG_ENDPOINT_TYPE => "AUDCLNT_E_WRONG_ENDPOINT_TYPE",
            Self::AUDCLNT_E_DEVICE_INVALIDATED => "AUDCLNT_E_DEVICE_INVALIDATED",
            Self::AUDCLNT_E_NOT_STOPPED => "AUDCLNT_E_NOT_STOPPED",
            Self::AUDCLNT_E_BUFFER_TOO_LARGE => "AUDCLNT_E_BUFFER_TOO_LARGE",
            Self::AUDCLNT_E_OUT_OF_ORDER => "AUDCLNT_E_OUT_OF_ORDER",
            Self::AUDCLNT_E_UNSUPPORTED_FORMAT => "AUDCLNT_E_UNSUPPORTED_FORMAT",
            Self::AUDCLNT_E_INVALID_SIZE => "AUDCLNT_E_INVALID_SIZE",
            Self::AUDCLNT_E_DEVICE_IN_USE => "AUDCLNT_E_DEVICE_IN_USE",
            Self::AUDCLNT_E_BUFFER_OPERATION_PENDING => "AUDCLNT_E_BUFFER_OPERATION_PENDING",
            Self::AUDCLNT_E_EXCLUSIVE_MODE_NOT_ALLOWED => "AUDCLNT_E_EXCLUSIVE_MODE_NOT_ALLOWED",
            Self::AUDCLNT_E_SERVICE_NOT_RUNNING => "AUDCLNT_E_SERVICE_NOT_RUNNING",
            Self::AUDCLNT_E_BUFFER_SIZE_ERROR => "AUDCLNT_E_BUFFER_SIZE_ERROR",
            Self::AUDCLNT_E_BUFFER_SIZE_NOT_ALIGNED => "AUDCLNT_E_BUFFER_SIZE_NOT_ALIGNED",
            Self::AUDCLNT_E_INVALID_DEVICE_PERIOD => "AUDCLNT_E_INVALID_DEVICE_PERIOD",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0 as u32)?;
        if let Some(name) = self.name() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_ranges() {
        assert!(HResult::S_OK.is_success());
        assert!(HResult::S_FALSE.is_success());
        assert!(HResult::AUDCLNT_E_NOT_STOPPED.is_failure());
        assert_eq!(HResult::S_FALSE.ok(), Ok(()));
        assert_eq!(
            HResult::AUDCLNT_E_DEVICE_IN_USE.ok(),
            Err(HResult::AUDCLNT_E_DEVICE_IN_USE)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            HResult::AUDCLNT_E_UNSUPPORTED_FORMAT.to_string(),
            "0x88890008 (AUDCLNT_E_UNSUPPORTED_FORMAT)"
        );
        assert_eq!(HResult(0x1234).to_string(), "0x00001234");
    }
}
