//! Sample format descriptors
//!
//! [`SampleFormat`] is the owned, immutable description of a stream layout
//! exchanged with the engine. The engine speaks in `WAVEFORMATEX` /
//! `WAVEFORMATEXTENSIBLE` blobs; this module decodes those blobs into owned
//! values and encodes values back for calls that take a format pointer.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::FormatError;

/// `WAVE_FORMAT_PCM`
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
/// `WAVE_FORMAT_IEEE_FLOAT`
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// `WAVE_FORMAT_EXTENSIBLE`
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the base `WAVEFORMATEX` header including `cbSize`
pub const WAVE_FORMAT_EX_SIZE: usize = 18;
/// Bytes of extension data carried by `WAVEFORMATEXTENSIBLE`
pub const EXTENSIBLE_EXTRA_SIZE: u16 = 22;
/// Full size of `WAVEFORMATEXTENSIBLE`
pub const WAVE_FORMAT_EXTENSIBLE_SIZE: usize = WAVE_FORMAT_EX_SIZE + EXTENSIBLE_EXTRA_SIZE as usize;

/// `KSDATAFORMAT_SUBTYPE_PCM`
pub const SUBTYPE_PCM: Uuid = Uuid::from_u128(0x00000001_0000_0010_8000_00aa00389b71);
/// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT`
pub const SUBTYPE_IEEE_FLOAT: Uuid = Uuid::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Speaker position bits used in channel masks
pub mod speaker {
    pub const FRONT_LEFT: u32 = 0x1;
    pub const FRONT_RIGHT: u32 = 0x2;
    pub const FRONT_CENTER: u32 = 0x4;
    pub const LOW_FREQUENCY: u32 = 0x8;
    pub const BACK_LEFT: u32 = 0x10;
    pub const BACK_RIGHT: u32 = 0x20;
}

/// Sub-format of an extensible layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubFormat {
    Pcm,
    IeeeFloat,
    Other(Uuid),
}

impl SubFormat {
    pub fn from_guid(guid: Uuid) -> Self {
        if guid == SUBTYPE_PCM {
            Self::Pcm
        } else if guid == SUBTYPE_IEEE_FLOAT {
            Self::IeeeFloat
        } else {
            Self::Other(guid)
        }
    }

    pub fn guid(self) -> Uuid {
        match self {
            Self::Pcm => SUBTYPE_PCM,
            Self::IeeeFloat => SUBTYPE_IEEE_FLOAT,
            Self::Other(guid) => guid,
        }
    }
}

/// Extension fields present only on extensible layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extensible {
    pub valid_bits_per_sample: u16,
    pub channel_mask: u32,
    pub sub_format: SubFormat,
}

/// An owned sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleFormat {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    avg_bytes_per_sec: u32,
    block_align: u16,
    bits_per_sample: u16,
    extensible: Option<Extensible>,
}

impl SampleFormat {
    /// Plain integer PCM layout
    pub fn pcm(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self::plain(WAVE_FORMAT_PCM, sample_rate, bits_per_sample, channels)
    }

    /// Plain 32-bit float layout
    pub fn ieee_float(sample_rate: u32, channels: u16) -> Self {
        Self::plain(WAVE_FORMAT_IEEE_FLOAT, sample_rate, 32, channels)
    }

    fn plain(format_tag: u16, sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        // Saturate instead of wrapping; validated requests never get this far
        let block_align = channels.saturating_mul(bits_per_sample / 8);
        Self {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate.saturating_mul(block_align as u32),
            block_align,
            bits_per_sample,
            extensible: None,
        }
    }

    /// Extensible layout; 32-bit depth selects float samples, anything else integer PCM.
    ///
    /// The channel mask covers the first `channels` speaker positions.
    pub fn extensible(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        let sub_format = if bits_per_sample == 32 {
            SubFormat::IeeeFloat
        } else {
            SubFormat::Pcm
        };
        let mut format = Self::plain(WAVE_FORMAT_EXTENSIBLE, sample_rate, bits_per_sample, channels);
        format.extensible = Some(Extensible {
            valid_bits_per_sample: bits_per_sample,
            channel_mask: default_channel_mask(channels),
            sub_format,
        });
        format
    }

    /// Layout the engine's mix-format response is decoded over
    pub fn mix_format_template() -> Self {
        Self::extensible(44100, 32, 2)
    }

    /// Same layout with a different extensible sub-format
    pub fn with_sub_format(mut self, sub_format: SubFormat) -> Self {
        if let Some(ext) = self.extensible.as_mut() {
            ext.sub_format = sub_format;
        }
        self
    }

    pub fn format_tag(&self) -> u16 {
        self.format_tag
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn block_align(&self) -> u16 {
        self.block_align
    }

    pub fn avg_bytes_per_sec(&self) -> u32 {
        self.avg_bytes_per_sec
    }

    pub fn extension(&self) -> Option<&Extensible> {
        self.extensible.as_ref()
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible.is_some()
    }

    pub fn channel_mask(&self) -> Option<u32> {
        self.extensible.map(|ext| ext.channel_mask)
    }

    /// Effective sub-format, derived from the tag for plain layouts
    pub fn sub_format(&self) -> SubFormat {
        match self.extensible {
            Some(ext) => ext.sub_format,
            None if self.format_tag == WAVE_FORMAT_IEEE_FLOAT => SubFormat::IeeeFloat,
            None => SubFormat::Pcm,
        }
    }

    pub fn is_float(&self) -> bool {
        self.sub_format() == SubFormat::IeeeFloat
    }

    /// Whether two formats describe the same sample layout, ignoring whether
    /// one is written as a plain header and the other as extensible.
    pub fn is_equivalent(&self, other: &SampleFormat) -> bool {
        self.sample_rate == other.sample_rate
            && self.channels == other.channels
            && self.bits_per_sample == other.bits_per_sample
            && self.sub_format() == other.sub_format()
    }

    /// Decode a `WAVEFORMATEX` or `WAVEFORMATEXTENSIBLE` blob.
    ///
    /// Fields are written over [`SampleFormat::mix_format_template`], so the
    /// result only keeps template values the blob does not describe.
    pub fn from_wave_format_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        // PCMWAVEFORMAT (16 bytes) is the smallest layout the engine hands out.
        if bytes.len() < 16 {
            return Err(FormatError::Truncated(bytes.len()));
        }

        let mut format = Self::mix_format_template();
        format.format_tag = read_u16(bytes, 0);
        format.channels = read_u16(bytes, 2);
        format.sample_rate = read_u32(bytes, 4);
        format.avg_bytes_per_sec = read_u32(bytes, 8);
        format.block_align = read_u16(bytes, 12);
        format.bits_per_sample = read_u16(bytes, 14);

        if format.channels == 0 {
            return Err(FormatError::InvalidChannels(0));
        }
        if format.sample_rate == 0 {
            return Err(FormatError::InvalidSampleRate(0));
        }

        match format.format_tag {
            WAVE_FORMAT_PCM | WAVE_FORMAT_IEEE_FLOAT => {
                format.extensible = None;
            }
            WAVE_FORMAT_EXTENSIBLE => {
                if bytes.len() < WAVE_FORMAT_EXTENSIBLE_SIZE {
                    return Err(FormatError::Truncated(bytes.len()));
                }
                let cb_size = read_u16(bytes, 16);
                if cb_size < EXTENSIBLE_EXTRA_SIZE {
                    return Err(FormatError::Truncated(WAVE_FORMAT_EX_SIZE + cb_size as usize));
                }
                format.extensible = Some(Extensible {
                    valid_bits_per_sample: read_u16(bytes, 18),
                    channel_mask: read_u32(bytes, 20),
                    sub_format: SubFormat::from_guid(read_guid(bytes, 24)),
                });
            }
            tag => return Err(FormatError::UnsupportedTag(tag)),
        }

        Ok(format)
    }

    /// Encode as the blob the engine expects behind a format pointer
    pub fn to_wave_format_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WAVE_FORMAT_EXTENSIBLE_SIZE);
        out.extend_from_slice(&self.format_tag.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        match &self.extensible {
            Some(ext) => {
                out.extend_from_slice(&EXTENSIBLE_EXTRA_SIZE.to_le_bytes());
                out.extend_from_slice(&ext.valid_bits_per_sample.to_le_bytes());
                out.extend_from_slice(&ext.channel_mask.to_le_bytes());
                out.extend_from_slice(&guid_to_le_bytes(ext.sub_format.guid()));
            }
            None => out.extend_from_slice(&0u16.to_le_bytes()),
        }

        out
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sub_format() {
            SubFormat::Pcm => "PCM".to_string(),
            SubFormat::IeeeFloat => "float".to_string(),
            SubFormat::Other(guid) => guid.to_string(),
        };
        write!(
            f,
            "{} Hz, {}-bit, {} ch ({})",
            self.sample_rate, self.bits_per_sample, self.channels, kind
        )?;
        if self.is_extensible() {
            write!(f, " [extensible]")?;
        }
        Ok(())
    }
}

/// Mask with one speaker bit per channel, lowest positions first
pub fn default_channel_mask(channels: u16) -> u32 {
    match channels {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => (1u32 << n) - 1,
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// GUIDs are stored with the first three fields little-endian.
fn read_guid(bytes: &[u8], offset: usize) -> Uuid {
    let d1 = read_u32(bytes, offset);
    let d2 = read_u16(bytes, offset + 4);
    let d3 = read_u16(bytes, offset + 6);
    let mut d4 = [0u8; 8];
    d4.copy_from_slice(&bytes[offset + 8..offset + 16]);
    Uuid::from_fields(d1, d2, d3, &d4)
}

fn guid_to_le_bytes(guid: Uuid) -> [u8; 16] {
    let (d1, d2, d3, d4) = guid.as_fields();
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&d1.to_le_bytes());
    out[4..6].copy_from_slice(&d2.to_le_bytes());
    out[6..8].copy_from_slice(&d3.to_le_bytes());
    out[8..16].copy_from_slice(d4);
    out
}
