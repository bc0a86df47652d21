//! mr-core: shared errors, configuration, timing and frame facts.
//!
//! This crate is the foundational dependency for the other mr-* crates,
//! providing the unified error type, reader configuration, rational
//! timebases, the per-stream frame-fact trackers, and media-domain enums.

pub mod config;
pub mod error;
pub mod facts;
pub mod media;
pub mod timing;

// Re-export the most commonly used items at the crate root.
pub use config::{ReaderConfig, ScalingAlgorithm, SeekConfig};
pub use error::{Error, ErrorCategory, Result};
pub use facts::{AudioFrameFacts, AudioObservation, MergePolicy, VideoFrameFacts, VideoObservation};
pub use media::*;
pub use timing::{Rational, StreamTiming};
