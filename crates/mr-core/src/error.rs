//! Unified error type for mediareader.
//!
//! Every crate funnels its failures into [`Error`]. Each variant belongs to an
//! [`ErrorCategory`] and carries a stable numeric result code via
//! [`Error::code`], so a thin C or CLI boundary can branch on it without
//! matching strings.
//!
//! End-of-stream is deliberately absent: it is an expected terminal condition
//! and is reported through return values, not through this type.

use std::fmt;
use std::path::PathBuf;

/// Result code reported for a successful operation.
pub const CODE_SUCCESS: i32 = 0;
/// Result code reported when a read hits the end of the source.
pub const CODE_END_OF_FILE: i32 = -1;
/// Result code reported when the decoder needs more input.
pub const CODE_AGAIN: i32 = -2;

/// Broad failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Opening the source or constructing decoders failed.
    Setup,
    /// The reader was used in the wrong lifecycle state.
    Lifecycle,
    /// Packet submission or frame reception failed.
    Pipeline,
    /// Pixel or sample conversion failed.
    Conversion,
    /// The container rejected a seek.
    Navigation,
    /// There is no new data to produce an output buffer from.
    DataAvailability,
    /// Configuration could not be parsed.
    Configuration,
    /// An I/O operation failed.
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Pipeline => write!(f, "pipeline"),
            Self::Conversion => write!(f, "conversion"),
            Self::Navigation => write!(f, "navigation"),
            Self::DataAvailability => write!(f, "data-availability"),
            Self::Configuration => write!(f, "configuration"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Unified error type covering all failure modes of the reader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container could not be opened.
    #[error("failed to open {}: {message}", path.display())]
    OpenFailed {
        /// Path that was being opened.
        path: PathBuf,
        /// Library-provided reason.
        message: String,
    },

    /// The container opened but holds no streams at all.
    #[error("no streams in {}", path.display())]
    NoStreams {
        /// Path of the opened source.
        path: PathBuf,
    },

    /// No stream in the container has a decoder available.
    #[error("no decodable stream in {}", path.display())]
    NoDecodableStream {
        /// Path of the opened source.
        path: PathBuf,
    },

    /// The codec library has no decoder for a stream's codec.
    #[error("no decoder for stream {stream}: {codec}")]
    CodecNotFound {
        /// Stream index.
        stream: usize,
        /// Codec name as reported by the container.
        codec: String,
    },

    /// A decoder was found but could not be configured or opened.
    #[error("failed to open decoder for stream {stream}: {message}")]
    DecoderOpen {
        /// Stream index.
        stream: usize,
        /// Library-provided reason.
        message: String,
    },

    /// The operation requires an open reader.
    #[error("reader is not open")]
    NotOpen,

    /// `open` was called on a reader that already holds a source.
    #[error("reader is already open on {}", path.display())]
    AlreadyOpen {
        /// Path of the currently open source.
        path: PathBuf,
    },

    /// The source has no video stream.
    #[error("source has no video stream")]
    NoVideoStream,

    /// The source has no audio stream.
    #[error("source has no audio stream")]
    NoAudioStream,

    /// Reading the next packet from the container failed.
    #[error("failed to read packet: {0}")]
    ReadFailed(String),

    /// The decoder rejected a submitted packet.
    #[error("decoder for stream {stream} rejected packet: {message}")]
    SubmitRejected {
        /// Stream index.
        stream: usize,
        /// Library-provided reason.
        message: String,
    },

    /// Receiving a frame failed for a reason other than "not ready".
    #[error("decoder for stream {stream} failed to produce a frame: {message}")]
    ReceiveRejected {
        /// Stream index.
        stream: usize,
        /// Library-provided reason.
        message: String,
    },

    /// The pixel converter could not be constructed or failed to run.
    #[error("pixel converter error: {0}")]
    Converter(String),

    /// The resampler could not be constructed.
    #[error("resampler unavailable: {0}")]
    ResamplerUnavailable(String),

    /// A resample step reported failure.
    #[error("resample failed: {0}")]
    ResampleFailed(String),

    /// The container rejected a seek.
    #[error("seek on stream {stream} to {target} failed: {message}")]
    SeekFailed {
        /// Stream index.
        stream: usize,
        /// Target timestamp in stream timebase units.
        target: i64,
        /// Library-provided reason.
        message: String,
    },

    /// There is no newly decoded data to produce an output buffer from.
    #[error("no data available")]
    NoDataAvailable,

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// The broad failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::OpenFailed { .. }
            | Error::NoStreams { .. }
            | Error::NoDecodableStream { .. }
            | Error::CodecNotFound { .. }
            | Error::DecoderOpen { .. } => ErrorCategory::Setup,
            Error::NotOpen
            | Error::AlreadyOpen { .. }
            | Error::NoVideoStream
            | Error::NoAudioStream => ErrorCategory::Lifecycle,
            Error::ReadFailed(_) | Error::SubmitRejected { .. } | Error::ReceiveRejected { .. } => {
                ErrorCategory::Pipeline
            }
            Error::Converter(_) | Error::ResamplerUnavailable(_) | Error::ResampleFailed(_) => {
                ErrorCategory::Conversion
            }
            Error::SeekFailed { .. } => ErrorCategory::Navigation,
            Error::NoDataAvailable => ErrorCategory::DataAvailability,
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Stable positive result code for a C or CLI boundary.
    pub fn code(&self) -> i32 {
        match self {
            Error::OpenFailed { .. } => 2,
            Error::CodecNotFound { .. } | Error::NoDecodableStream { .. } => 3,
            Error::DecoderOpen { .. } => 4,
            Error::NoStreams { .. } => 5,
            Error::NoVideoStream => 6,
            Error::NoAudioStream => 7,
            Error::ResamplerUnavailable(_) => 11,
            Error::ResampleFailed(_) => 12,
            Error::ReadFailed(_) => 14,
            Error::SubmitRejected { .. } => 15,
            Error::ReceiveRejected { .. } => 16,
            Error::Converter(_) => 17,
            Error::SeekFailed { .. } => 18,
            Error::NoDataAvailable => 19,
            Error::NotOpen => 24,
            Error::AlreadyOpen { .. } => 25,
            Error::Config(_) => 26,
            Error::Io { .. } => 27,
        }
    }

    /// Convenience constructor for [`Error::OpenFailed`].
    pub fn open_failed(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Error::OpenFailed {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::DecoderOpen`].
    pub fn decoder_open(stream: usize, message: impl fmt::Display) -> Self {
        Error::DecoderOpen {
            stream,
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::SubmitRejected`].
    pub fn submit_rejected(stream: usize, message: impl fmt::Display) -> Self {
        Error::SubmitRejected {
            stream,
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::ReceiveRejected`].
    pub fn receive_rejected(stream: usize, message: impl fmt::Display) -> Self {
        Error::ReceiveRejected {
            stream,
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::SeekFailed`].
    pub fn seek_failed(stream: usize, target: i64, message: impl fmt::Display) -> Self {
        Error::SeekFailed {
            stream,
            target,
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failed_display() {
        let err = Error::open_failed("/media/missing.mkv", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "failed to open /media/missing.mkv: No such file or directory"
        );
        assert_eq!(err.category(), ErrorCategory::Setup);
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn seek_failed_display() {
        let err = Error::seek_failed(0, 76_800, "Operation not permitted");
        assert_eq!(
            err.to_string(),
            "seek on stream 0 to 76800 failed: Operation not permitted"
        );
        assert_eq!(err.category(), ErrorCategory::Navigation);
        assert_eq!(err.code(), 18);
    }

    #[test]
    fn pipeline_errors_are_distinct() {
        let submit = Error::submit_rejected(1, "invalid data");
        let receive = Error::receive_rejected(1, "invalid data");
        assert_eq!(submit.category(), ErrorCategory::Pipeline);
        assert_eq!(receive.category(), ErrorCategory::Pipeline);
        assert_ne!(submit.code(), receive.code());
    }

    #[test]
    fn no_data_available_is_its_own_category() {
        let err = Error::NoDataAvailable;
        assert_eq!(err.category(), ErrorCategory::DataAvailability);
        assert_eq!(err.code(), 19);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn codes_never_collide_with_terminal_codes() {
        let samples = [
            Error::NotOpen,
            Error::NoVideoStream,
            Error::NoAudioStream,
            Error::NoDataAvailable,
            Error::Converter("x".into()),
            Error::ResampleFailed("x".into()),
        ];
        for err in samples {
            assert!(err.code() > CODE_SUCCESS, "{err} has code {}", err.code());
            assert_ne!(err.code(), CODE_END_OF_FILE);
            assert_ne!(err.code(), CODE_AGAIN);
        }
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::DataAvailability.to_string(), "data-availability");
        assert_eq!(ErrorCategory::Navigation.to_string(), "navigation");
    }
}
