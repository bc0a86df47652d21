//! Coarse seeking and timestamp convergence.
//!
//! Containers can only be repositioned to accessible (key) frames, so landing
//! on a particular presentation timestamp means seeking backward, decoding
//! forward and, on overshoot, seeking back further with a doubling radius.
//! Convergence stops when the decoded pts is within tolerance of the target,
//! when a step makes no progress, or after `seek.max_iterations` overshoot
//! re-seeks. Forward catch-up is not counted against that bound; it ends at
//! the target or at the end of the stream.

use mr_codec::{CodecLibrary, Container, Decoder, PacketInfo};
use mr_core::{Error, MediaKind, Result, SeekDirection};

use crate::pipeline::Step;
use crate::state::{OpenSource, ReaderState};

/// How a convergence call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The decoded frame is within tolerance of the target.
    Converged { pts: i64 },
    /// The stream could not get closer; `pts` is the closest frame reached.
    Plateau { pts: i64 },
    /// The re-seek bound was hit before converging. `pts` is outside tolerance.
    IterationLimit { pts: i64 },
    /// The frame reached after the initial seek carries no timestamp.
    Untimed,
    /// Nothing could be decoded after the initial seek.
    EndOfStream,
}

impl TrackOutcome {
    /// Pts of the frame the reader ended on.
    pub fn pts(&self) -> Option<i64> {
        match *self {
            Self::Converged { pts } | Self::Plateau { pts } | Self::IterationLimit { pts } => {
                Some(pts)
            }
            Self::Untimed | Self::EndOfStream => None,
        }
    }

    /// The reader ended on the closest frame it could reach.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converged { .. } | Self::Plateau { .. })
    }
}

impl<L: CodecLibrary> OpenSource<L> {
    /// Reposition the container on the stream of `kind` and flush both decoders.
    fn seek(&mut self, kind: MediaKind, target: i64, direction: SeekDirection) -> Result<()> {
        let stream = self
            .slot(kind)
            .map(|s| s.index())
            .ok_or(match kind {
                MediaKind::Video => Error::NoVideoStream,
                _ => Error::NoAudioStream,
            })?;

        tracing::debug!(stream, target, ?direction, "seeking");
        self.container.seek(stream, target, direction)?;

        for slot in [self.video.as_mut(), self.audio.as_mut()].into_iter().flatten() {
            slot.decoder.flush();
            slot.draining = false;
        }
        self.packet.clear();
        Ok(())
    }
}

/// Parameters of one convergence run.
struct Search {
    kind: MediaKind,
    radius: i64,
    tolerance: i64,
    max_iterations: u32,
}

impl<L: CodecLibrary> ReaderState<L> {
    /// Seek the video stream to the accessible frame nearest `target` on the
    /// `direction` side, then flush the decoders.
    pub fn seek_to_frame(&mut self, target: i64, direction: SeekDirection) -> Result<()> {
        self.source_mut()?.seek(MediaKind::Video, target, direction)
    }

    /// Audio counterpart of [`seek_to_frame`](Self::seek_to_frame).
    pub fn seek_to_audio_frame(&mut self, target: i64, direction: SeekDirection) -> Result<()> {
        self.source_mut()?.seek(MediaKind::Audio, target, direction)
    }

    /// Seek the video stream back to timestamp zero.
    pub fn seek_to_start(&mut self) -> Result<()> {
        self.seek_to_frame(0, SeekDirection::Backward)
    }

    /// Seek the audio stream back to timestamp zero.
    pub fn seek_to_audio_start(&mut self) -> Result<()> {
        self.seek_to_audio_frame(0, SeekDirection::Backward)
    }

    /// Converge the video stream onto the frame presented at `target`.
    ///
    /// On return the frame slot holds the closest frame reached.
    pub fn track_to_frame(&mut self, target: i64) -> Result<TrackOutcome> {
        let interval = self.video_frame_interval()?;
        let fps = i64::from(self.fps()?);
        let search = Search {
            kind: MediaKind::Video,
            radius: interval.saturating_mul(fps).max(interval),
            tolerance: self.tolerance(interval),
            max_iterations: self.config.seek.max_iterations,
        };
        self.track(target, search)
    }

    /// Converge the audio stream onto the frame presented at `target`.
    ///
    /// The initial search radius is one second of audio timebase units.
    pub fn track_to_audio_frame(&mut self, target: i64) -> Result<TrackOutcome> {
        let interval = self.audio_frame_interval()?;
        let radius = self
            .audio_timing()?
            .units_per_second()
            .unwrap_or(interval)
            .max(interval);
        let search = Search {
            kind: MediaKind::Audio,
            radius,
            tolerance: self.tolerance(interval),
            max_iterations: self.config.seek.max_iterations,
        };
        self.track(target, search)
    }

    /// Step back to the video frame one interval before the current one.
    pub fn rewind_frame(&mut self) -> Result<TrackOutcome> {
        let interval = self.video_frame_interval()?;
        let current = self
            .video_facts()?
            .presentation_ts()
            .ok_or(Error::NoDataAvailable)?;
        self.track_to_frame(current.saturating_sub(interval).max(0))
    }

    fn tolerance(&self, interval: i64) -> i64 {
        interval.saturating_sub(self.config.seek.tolerance_guard).max(0)
    }

    fn track(&mut self, target: i64, search: Search) -> Result<TrackOutcome> {
        let drain = self.config.drain_at_end_of_stream;
        let source = self.source_mut()?;
        let kind = search.kind;
        let within = |pts: i64| pts.abs_diff(target) <= search.tolerance.unsigned_abs();

        source.seek(kind, target, SeekDirection::Backward)?;
        let mut current = match source.advance(kind, drain)? {
            Step::Ready(Some(pts)) => pts,
            Step::Ready(None) => {
                tracing::debug!(target, "first frame after seek has no timestamp");
                return Ok(TrackOutcome::Untimed);
            }
            Step::EndOfStream => return Ok(TrackOutcome::EndOfStream),
        };

        let mut interval = search.radius;
        let mut reseeks = 0u32;
        let mut steps = 0u64;

        while !within(current) {
            steps += 1;
            let step = if current < target {
                source.advance(kind, drain)?
            } else {
                if reseeks >= search.max_iterations {
                    tracing::warn!(
                        target,
                        pts = current,
                        reseeks,
                        "seek convergence hit the iteration limit"
                    );
                    return Ok(TrackOutcome::IterationLimit { pts: current });
                }
                reseeks += 1;
                interval = interval.saturating_mul(2);
                source.seek(kind, current.saturating_sub(interval), SeekDirection::Backward)?;
                source.advance(kind, drain)?
            };

            // Untimestamped frames and end of stream count as no progress.
            let observed = match step {
                Step::Ready(Some(pts)) => pts,
                Step::Ready(None) | Step::EndOfStream => current,
            };
            tracing::trace!(target, pts = observed, interval, steps, reseeks, "convergence step");

            if observed == current {
                tracing::debug!(target, pts = current, steps, "convergence plateau");
                return Ok(TrackOutcome::Plateau { pts: current });
            }
            current = observed;
        }

        tracing::debug!(target, pts = current, steps, reseeks, "converged");
        Ok(TrackOutcome::Converged { pts: current })
    }
}
