//! # mr-reader
//!
//! A stateful dual-stream media reader.
//!
//! [`ReaderState`] owns one open source at a time: its container, one decoder
//! per selected stream, lazily created pixel converter and resampler, and the
//! reusable packet and frame slots. On top of it sit:
//!
//! - the pipeline ([`ReaderState::read_packet`], [`ReaderState::advance_video`],
//!   [`ReaderState::advance_audio`]), which reads, routes and decodes;
//! - the output producer ([`ReaderState::read_video_frame`],
//!   [`ReaderState::read_audio_frame`]), which yields RGB0 pixels and
//!   interleaved stereo `f32` samples;
//! - the seek controller ([`ReaderState::track_to_frame`] and friends), which
//!   converges onto a target presentation timestamp.
//!
//! ## Quick start
//!
//! ```
//! use mr_codec::{SyntheticLibrary, SyntheticSource};
//! use mr_reader::{ReaderState, Step, TrackOutcome};
//!
//! let library = SyntheticLibrary::new().with_source("clip.mkv", SyntheticSource::clip(10, 30));
//! let mut reader = ReaderState::new(library);
//! reader.open("clip.mkv").unwrap();
//!
//! let target = 150 * reader.video_frame_interval().unwrap();
//! let outcome = reader.track_to_frame(target).unwrap();
//! assert_eq!(outcome, TrackOutcome::Converged { pts: target });
//!
//! if let Step::Ready(frame) = reader.read_video_frame().unwrap() {
//!     assert_eq!(frame.data.len(), 320 * 240 * 4);
//! }
//! reader.close();
//! ```

mod output;
mod pipeline;
mod seek;
mod state;

pub use output::{load_first_frame, AudioBuffer, VideoBuffer};
pub use pipeline::{PacketStamp, Step};
pub use seek::TrackOutcome;
pub use state::ReaderState;
