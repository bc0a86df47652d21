//! Per-frame timing and identity facts for the video and audio streams.
//!
//! Video facts are overwritten on every decoded frame. Audio facts are merged
//! field by field with an explicit [`MergePolicy`], because one container can
//! carry audio frames of varying shape and only the first reliable
//! observation is trustworthy for buffer sizing.

/// How a tracked field absorbs a new observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the first known value; later observations are ignored.
    FirstKnown,
    /// Keep the largest value seen so far.
    MonotonicMax,
    /// Replace the value when the observation is known, keep it otherwise.
    KnownOverwrites,
    /// Replace the value unconditionally, including with "unknown".
    AlwaysOverwrite,
}

impl MergePolicy {
    /// Fold `observed` into `current` according to this policy.
    pub fn merge<T: Ord + Copy>(self, current: &mut Option<T>, observed: Option<T>) {
        match self {
            MergePolicy::FirstKnown => {
                if current.is_none() {
                    *current = observed;
                }
            }
            MergePolicy::MonotonicMax => {
                if let Some(value) = observed {
                    if current.map_or(true, |c| value > c) {
                        *current = Some(value);
                    }
                }
            }
            MergePolicy::KnownOverwrites => {
                if observed.is_some() {
                    *current = observed;
                }
            }
            MergePolicy::AlwaysOverwrite => *current = observed,
        }
    }
}

/// Treat zero and negative library values as unknown.
pub fn known<T: Into<i64> + Copy>(value: T) -> Option<T> {
    (value.into() > 0).then_some(value)
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// What the decoder reported about one decoded video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoObservation {
    pub frame_number: Option<u64>,
    pub pts: Option<i64>,
    pub pkt_dts: Option<i64>,
    pub key_frame: bool,
    pub packet_size: Option<usize>,
}

/// Facts about the most recent video packet and frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFrameFacts {
    pub frame_number: Option<u64>,
    pub packet_pts: Option<i64>,
    pub packet_dts: Option<i64>,
    pub frame_pts: Option<i64>,
    /// The packet dts the frame was decoded from.
    pub frame_pkt_dts: Option<i64>,
    pub key_frame: Option<bool>,
    pub packet_size: Option<usize>,
}

impl VideoFrameFacts {
    /// Record a raw packet. Called for every packet read, before routing.
    pub fn record_packet(&mut self, pts: Option<i64>, dts: Option<i64>) {
        self.packet_pts = pts;
        self.packet_dts = dts;
    }

    /// Record a successfully decoded frame.
    pub fn record_frame(&mut self, frame: &VideoObservation) {
        self.frame_number = frame.frame_number;
        self.frame_pts = frame.pts;
        self.frame_pkt_dts = frame.pkt_dts;
        self.key_frame = Some(frame.key_frame);
        self.packet_size = frame.packet_size;
    }

    /// Best available presentation time of the current frame.
    pub fn presentation_ts(&self) -> Option<i64> {
        self.frame_pts.or(self.frame_pkt_dts)
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// What the decoder reported about one decoded audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioObservation {
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub line_size: Option<usize>,
    pub samples: Option<u32>,
    pub pts: Option<i64>,
    pub pkt_dts: Option<i64>,
    pub best_effort_ts: Option<i64>,
}

/// Facts about the audio stream accumulated across decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFrameFacts {
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub line_size: Option<usize>,
    pub samples: Option<u32>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub best_effort_ts: Option<i64>,
    pub bit_rate: Option<i64>,
}

impl AudioFrameFacts {
    pub const CHANNELS: MergePolicy = MergePolicy::FirstKnown;
    pub const SAMPLE_RATE: MergePolicy = MergePolicy::FirstKnown;
    pub const LINE_SIZE: MergePolicy = MergePolicy::FirstKnown;
    pub const SAMPLES: MergePolicy = MergePolicy::MonotonicMax;
    pub const TIMESTAMPS: MergePolicy = MergePolicy::AlwaysOverwrite;
    pub const BIT_RATE: MergePolicy = MergePolicy::KnownOverwrites;

    /// Merge a decoded frame into the running facts.
    pub fn record_frame(&mut self, frame: &AudioObservation) {
        Self::CHANNELS.merge(&mut self.channels, frame.channels);
        Self::SAMPLE_RATE.merge(&mut self.sample_rate, frame.sample_rate);
        Self::LINE_SIZE.merge(&mut self.line_size, frame.line_size);
        Self::SAMPLES.merge(&mut self.samples, frame.samples);
        Self::TIMESTAMPS.merge(&mut self.pts, frame.pts);
        Self::TIMESTAMPS.merge(&mut self.dts, frame.pkt_dts);
        Self::TIMESTAMPS.merge(&mut self.best_effort_ts, frame.best_effort_ts);
    }

    /// Fold in the decoder's configured bit rate.
    pub fn record_bit_rate(&mut self, bit_rate: Option<i64>) {
        Self::BIT_RATE.merge(&mut self.bit_rate, bit_rate);
    }

    /// Bytes needed for one frame of `channels × samples` at the given width,
    /// or `None` when the shape is not known yet.
    pub fn buffer_size(&self, bytes_per_sample: usize) -> Option<usize> {
        let channels = self.channels? as usize;
        let samples = self.samples? as usize;
        let size = channels * samples * bytes_per_sample;
        (size > 0).then_some(size)
    }

    /// Best available presentation time of the current frame.
    pub fn presentation_ts(&self) -> Option<i64> {
        self.pts.or(self.best_effort_ts).or(self.dts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(channels: u32, rate: u32, samples: u32, pts: i64) -> AudioObservation {
        AudioObservation {
            channels: known(channels),
            sample_rate: known(rate),
            line_size: Some(samples as usize * 4),
            samples: known(samples),
            pts: Some(pts),
            pkt_dts: Some(pts),
            best_effort_ts: Some(pts),
        }
    }

    #[test]
    fn first_known_is_sticky() {
        let mut value = None;
        MergePolicy::FirstKnown.merge(&mut value, None);
        assert_eq!(value, None);
        MergePolicy::FirstKnown.merge(&mut value, Some(2));
        MergePolicy::FirstKnown.merge(&mut value, Some(6));
        assert_eq!(value, Some(2));
    }

    #[test]
    fn monotonic_max_never_shrinks() {
        let mut value = None;
        MergePolicy::MonotonicMax.merge(&mut value, Some(1024));
        MergePolicy::MonotonicMax.merge(&mut value, Some(512));
        MergePolicy::MonotonicMax.merge(&mut value, None);
        assert_eq!(value, Some(1024));
        MergePolicy::MonotonicMax.merge(&mut value, Some(2048));
        assert_eq!(value, Some(2048));
    }

    #[test]
    fn known_overwrites_keeps_last_known() {
        let mut value = None;
        MergePolicy::KnownOverwrites.merge(&mut value, Some(128_000));
        MergePolicy::KnownOverwrites.merge(&mut value, None);
        assert_eq!(value, Some(128_000));
        MergePolicy::KnownOverwrites.merge(&mut value, Some(96_000));
        assert_eq!(value, Some(96_000));
    }

    #[test]
    fn always_overwrite_accepts_unknown() {
        let mut value = Some(7);
        MergePolicy::AlwaysOverwrite.merge(&mut value, None);
        assert_eq!(value, None);
    }

    #[test]
    fn known_filters_non_positive() {
        assert_eq!(known(0u32), None);
        assert_eq!(known(-1i64), None);
        assert_eq!(known(48_000u32), Some(48_000));
    }

    #[test]
    fn audio_facts_merge_policy() {
        let mut facts = AudioFrameFacts::default();
        facts.record_frame(&audio(2, 48_000, 1024, 0));
        facts.record_frame(&audio(6, 44_100, 960, 1024));

        assert_eq!(facts.channels, Some(2));
        assert_eq!(facts.sample_rate, Some(48_000));
        assert_eq!(facts.samples, Some(1024));
        assert_eq!(facts.pts, Some(1024));
        assert_eq!(facts.presentation_ts(), Some(1024));
    }

    #[test]
    fn audio_buffer_size() {
        let mut facts = AudioFrameFacts::default();
        assert_eq!(facts.buffer_size(4), None);

        facts.record_frame(&audio(2, 48_000, 1024, 0));
        assert_eq!(facts.buffer_size(4), Some(2 * 1024 * 4));
        assert_eq!(facts.buffer_size(2), Some(2 * 1024 * 2));
        assert_eq!(facts.buffer_size(0), None);
    }

    #[test]
    fn bit_rate_tracking() {
        let mut facts = AudioFrameFacts::default();
        facts.record_bit_rate(None);
        assert_eq!(facts.bit_rate, None);
        facts.record_bit_rate(Some(192_000));
        facts.record_bit_rate(None);
        assert_eq!(facts.bit_rate, Some(192_000));
    }

    #[test]
    fn video_facts_packet_then_frame() {
        let mut facts = VideoFrameFacts::default();
        facts.record_packet(Some(1024), Some(512));
        assert_eq!(facts.packet_pts, Some(1024));
        assert_eq!(facts.frame_pts, None);

        facts.record_frame(&VideoObservation {
            frame_number: Some(3),
            pts: Some(512),
            pkt_dts: Some(512),
            key_frame: true,
            packet_size: Some(4096),
        });
        assert_eq!(facts.frame_number, Some(3));
        assert_eq!(facts.presentation_ts(), Some(512));
        assert_eq!(facts.key_frame, Some(true));
        assert_eq!(facts.packet_pts, Some(1024));
    }

    #[test]
    fn video_presentation_falls_back_to_dts() {
        let mut facts = VideoFrameFacts::default();
        facts.record_frame(&VideoObservation {
            pts: None,
            pkt_dts: Some(2048),
            ..Default::default()
        });
        assert_eq!(facts.presentation_ts(), Some(2048));
    }

    #[test]
    fn facts_compare_for_repeat_detection() {
        let mut a = VideoFrameFacts::default();
        a.record_packet(Some(0), Some(0));
        let b = a;
        assert_eq!(a, b);
    }
}
