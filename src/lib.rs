//! mediareader - stateful dual-stream media reading with seek convergence.
//!
//! This facade re-exports the public surface of the workspace crates and
//! provides logging initialisation for binaries and tests built on it.
//!
//! ```
//! use mediareader::{ReaderState, Step, SyntheticLibrary, SyntheticSource};
//!
//! let library = SyntheticLibrary::new().with_source("clip.mkv", SyntheticSource::clip(1, 30));
//! let mut reader = ReaderState::new(library);
//! reader.open("clip.mkv").unwrap();
//! while let Step::Ready(frame) = reader.read_video_frame().unwrap() {
//!     assert_eq!(frame.data.len(), frame.width as usize * frame.height as usize * 4);
//! }
//! ```

pub use mr_codec::{
    CodecLibrary, StreamInfo, SyntheticAudio, SyntheticFault, SyntheticLibrary, SyntheticSource,
    SyntheticVideo,
};
#[cfg(feature = "native-ffmpeg")]
pub use mr_codec::FfmpegLibrary;
pub use mr_core::{
    AudioFrameFacts, Error, ErrorCategory, MediaKind, Rational, ReaderConfig, Result,
    SampleFormat, ScalingAlgorithm, SeekConfig, SeekDirection, StreamTiming, VideoFrameFacts,
};
pub use mr_reader::{
    load_first_frame, AudioBuffer, PacketStamp, ReaderState, Step, TrackOutcome, VideoBuffer,
};

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "mediareader=trace,mr_reader=trace,mr_codec=debug,mr_core=debug"
    } else {
        "mediareader=info,mr_reader=info,mr_codec=warn,mr_core=info"
    }
}

/// Install a global `fmt` subscriber.
///
/// Respects `RUST_LOG` if set, otherwise uses [`default_log_filter`].
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_filter(verbose).to_string());

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .try_init()
        .is_ok()
}
