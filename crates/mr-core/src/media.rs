//! Media-domain enums for stream kinds, seek directions and sample formats.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The kind of elementary stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Data => write!(f, "data"),
        }
    }
}

// ---------------------------------------------------------------------------
// SeekDirection
// ---------------------------------------------------------------------------

/// Which side of the target a container-level seek may land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekDirection {
    /// Nearest accessible position at or before the target.
    #[default]
    Backward,
    /// Nearest accessible position at or after the target.
    Forward,
}

// ---------------------------------------------------------------------------
// SampleFormat
// ---------------------------------------------------------------------------

/// Native audio sample formats, packed (interleaved) and planar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    S64,
    Flt,
    Dbl,
    U8p,
    S16p,
    S32p,
    S64p,
    Fltp,
    Dblp,
}

impl SampleFormat {
    /// The interleaved equivalent of this format.
    pub fn packed(self) -> Self {
        match self {
            Self::U8p => Self::U8,
            Self::S16p => Self::S16,
            Self::S32p => Self::S32,
            Self::S64p => Self::S64,
            Self::Fltp => Self::Flt,
            Self::Dblp => Self::Dbl,
            other => other,
        }
    }

    pub fn is_planar(self) -> bool {
        self.packed() != self
    }

    pub fn bytes_per_sample(self) -> usize {
        match self.packed() {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::Flt => 4,
            _ => 8,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::S64 => "s64",
            Self::Flt => "flt",
            Self::Dbl => "dbl",
            Self::U8p => "u8p",
            Self::S16p => "s16p",
            Self::S32p => "s32p",
            Self::S64p => "s64p",
            Self::Fltp => "fltp",
            Self::Dblp => "dblp",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

/// Bytes per pixel of converted video buffers (RGB plus one padding byte).
pub const RGB0_BYTES_PER_PIXEL: usize = 4;

/// Channel count of resampled audio buffers.
pub const OUTPUT_CHANNELS: u32 = 2;

/// Sample format of resampled audio buffers: interleaved 32-bit float.
pub const OUTPUT_SAMPLE_FORMAT: SampleFormat = SampleFormat::Flt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_equivalents() {
        assert_eq!(SampleFormat::Fltp.packed(), SampleFormat::Flt);
        assert_eq!(SampleFormat::S16p.packed(), SampleFormat::S16);
        assert_eq!(SampleFormat::S32.packed(), SampleFormat::S32);
        assert!(SampleFormat::Dblp.is_planar());
        assert!(!SampleFormat::Dbl.is_planar());
    }

    #[test]
    fn sample_widths() {
        assert_eq!(SampleFormat::U8p.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::Fltp.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::S64.bytes_per_sample(), 8);
        assert_eq!(OUTPUT_SAMPLE_FORMAT.bytes_per_sample(), 4);
    }

    #[test]
    fn media_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MediaKind::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
