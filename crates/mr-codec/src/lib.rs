//! # mr-codec
//!
//! The codec library contract the reader drives, plus its backends.
//!
//! - [`SyntheticLibrary`] is pure Rust and always available. It generates
//!   deterministic interleaved streams with keyframes, decoder delay and
//!   injectable faults, which makes the reader testable without media files.
//! - `FfmpegLibrary` (feature `native-ffmpeg`) binds the system FFmpeg.
//!
//! ## Quick start
//!
//! ```
//! use mr_codec::{CodecLibrary, Container, SyntheticLibrary, SyntheticSource};
//! use std::path::Path;
//!
//! let library = SyntheticLibrary::new().with_source("clip.mkv", SyntheticSource::clip(2, 30));
//! let container = library.open_container(Path::new("clip.mkv")).unwrap();
//! assert_eq!(container.streams().len(), 2);
//! ```

pub mod library;
pub mod synthetic;

#[cfg(feature = "native-ffmpeg")]
pub mod ffmpeg;

// Re-export key types at crate root for convenience.
pub use library::{
    CodecLibrary, Container, Converter, DecodeStatus, Decoder, FrameInfo, PacketInfo, ReadStatus,
    ResampleStatus, Resampler, StreamInfo,
};
pub use synthetic::{
    SyntheticAudio, SyntheticFault, SyntheticLibrary, SyntheticSource, SyntheticVideo,
};

#[cfg(feature = "native-ffmpeg")]
pub use ffmpeg::FfmpegLibrary;
