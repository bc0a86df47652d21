//! A deterministic, pure-Rust codec library.
//!
//! [`SyntheticLibrary`] serves in-memory sources registered under a path. Each
//! source describes an optional video stream and an optional audio stream; the
//! library generates an interleaved packet schedule for them and decodes it
//! with the behaviour real decoders exhibit: keyframe-aligned seeking, a
//! configurable decoder delay (frames are "not ready" until enough packets
//! were submitted), packets that decode to several frames, refusal of new
//! input while output is pending, draining at end of stream, and injectable
//! faults.
//!
//! Converted pixels encode the frame ordinal, so tests can tell which frame a
//! buffer came from without decoding anything real.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mr_core::facts::known;
use mr_core::{
    AudioObservation, Error, MediaKind, Rational, Result, SampleFormat, ScalingAlgorithm,
    SeekDirection, StreamTiming, VideoObservation, RGB0_BYTES_PER_PIXEL,
};

use crate::library::{
    CodecLibrary, Container, Converter, DecodeStatus, Decoder, FrameInfo, PacketInfo, ReadStatus,
    ResampleStatus, Resampler, StreamInfo,
};

const VIDEO_CODEC: &str = "synthetic video";
const AUDIO_CODEC: &str = "synthetic audio";

// ---------------------------------------------------------------------------
// Source description
// ---------------------------------------------------------------------------

/// Shape of a synthetic video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticVideo {
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
    /// Rate the frames are actually spaced at.
    pub frame_rate: Rational,
    /// Rate the container reports, when it differs from `frame_rate`.
    pub reported_frame_rate: Option<Rational>,
    pub frame_count: u32,
    /// Distance between keyframes, in frames.
    pub gop: u32,
    /// Packets the decoder buffers before its first frame comes out.
    pub decoder_delay: usize,
    /// Presentation timestamp of the first frame.
    pub start_pts: i64,
}

impl Default for SyntheticVideo {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            time_base: Rational::new(1, 15360),
            frame_rate: Rational::new(30, 1),
            reported_frame_rate: None,
            frame_count: 300,
            gop: 30,
            decoder_delay: 2,
            start_pts: 0,
        }
    }
}

impl SyntheticVideo {
    /// Presentation timestamp of frame `ordinal` in timebase units.
    pub fn pts_of(&self, ordinal: u32) -> i64 {
        let tb = self.time_base;
        let rate = self.frame_rate;
        let num = i64::from(ordinal) * i64::from(tb.den) * i64::from(rate.den.max(1));
        let den = i64::from(tb.num.max(1)) * i64::from(rate.num.max(1));
        self.start_pts + num / den
    }

    fn seconds_of(&self, ordinal: u32) -> f64 {
        f64::from(ordinal) * f64::from(self.frame_rate.den.max(1))
            / f64::from(self.frame_rate.num.max(1))
    }

    fn timing(&self) -> StreamTiming {
        StreamTiming {
            time_base: self.time_base,
            avg_frame_rate: self.reported_frame_rate.unwrap_or(self.frame_rate),
            duration: Some(self.pts_of(self.frame_count) - self.start_pts),
            start_time: Some(self.start_pts),
            frame_count: Some(i64::from(self.frame_count)),
        }
    }
}

/// Shape of a synthetic audio stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticAudio {
    pub sample_rate: u32,
    pub channels: u32,
    pub time_base: Rational,
    pub samples_per_frame: u32,
    /// A shorter first frame, as produced by codecs with priming samples.
    pub first_frame_samples: Option<u32>,
    pub frame_count: u32,
    pub sample_format: SampleFormat,
    pub bit_rate: Option<i64>,
    /// Maximum samples the resampler emits per call; the rest stays pending.
    pub resampler_chunk: Option<u32>,
    /// Frames carried by each packet.
    pub frames_per_packet: u32,
}

impl Default for SyntheticAudio {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            time_base: Rational::new(1, 48_000),
            samples_per_frame: 1024,
            first_frame_samples: None,
            frame_count: 469,
            sample_format: SampleFormat::Fltp,
            bit_rate: Some(128_000),
            resampler_chunk: None,
            frames_per_packet: 1,
        }
    }
}

impl SyntheticAudio {
    fn samples_in(&self, ordinal: u32) -> u32 {
        match (ordinal, self.first_frame_samples) {
            (0, Some(first)) => first,
            _ => self.samples_per_frame,
        }
    }

    /// Samples preceding frame `ordinal`.
    fn offset_of(&self, ordinal: u32) -> i64 {
        if ordinal == 0 {
            return 0;
        }
        i64::from(self.samples_in(0)) + i64::from(ordinal - 1) * i64::from(self.samples_per_frame)
    }

    /// Presentation timestamp of frame `ordinal` in timebase units.
    pub fn pts_of(&self, ordinal: u32) -> i64 {
        let tb = self.time_base;
        self.offset_of(ordinal) * i64::from(tb.den)
            / (i64::from(tb.num.max(1)) * i64::from(self.sample_rate.max(1)))
    }

    fn seconds_of(&self, ordinal: u32) -> f64 {
        self.offset_of(ordinal) as f64 / f64::from(self.sample_rate.max(1))
    }

    fn timing(&self) -> StreamTiming {
        StreamTiming {
            time_base: self.time_base,
            avg_frame_rate: Rational::new(0, 0),
            duration: Some(self.pts_of(self.frame_count)),
            start_time: Some(0),
            frame_count: Some(i64::from(self.frame_count)),
        }
    }
}

/// Failures a synthetic source can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFault {
    /// Every container seek is rejected.
    SeekRejected,
    /// Reading fails after this many packets.
    ReadFails { after_packets: usize },
    /// The library has no decoder for streams of this kind.
    MissingDecoder(MediaKind),
    /// The decoder for streams of this kind fails to open.
    DecoderOpenFails(MediaKind),
    /// The decoder rejects this packet on submission.
    CorruptPacket { kind: MediaKind, ordinal: u32 },
    /// The decoder fails when this frame would come out.
    DecodeError { kind: MediaKind, ordinal: u32 },
    /// Packets and frames of this kind carry no timestamps.
    MissingTimestamps(MediaKind),
    ConverterUnavailable,
    ResamplerUnavailable,
    ResampleFails,
}

/// An in-memory source with optional video and audio streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntheticSource {
    pub video: Option<SyntheticVideo>,
    pub audio: Option<SyntheticAudio>,
    pub faults: Vec<SyntheticFault>,
}

impl SyntheticSource {
    /// A clip of `seconds` at `fps` with 320x240 video and 48 kHz stereo audio.
    pub fn clip(seconds: u32, fps: u32) -> Self {
        let audio = SyntheticAudio::default();
        let samples = u64::from(seconds) * u64::from(audio.sample_rate);
        let frames = samples.div_ceil(u64::from(audio.samples_per_frame));
        Self {
            video: Some(SyntheticVideo {
                time_base: Rational::new(1, fps as i32 * 512),
                frame_rate: Rational::new(fps as i32, 1),
                frame_count: seconds * fps,
                gop: fps,
                ..SyntheticVideo::default()
            }),
            audio: Some(SyntheticAudio {
                frame_count: frames as u32,
                ..audio
            }),
            faults: Vec::new(),
        }
    }

    pub fn with_video(mut self, video: SyntheticVideo) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_audio(mut self, audio: SyntheticAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn without_video(mut self) -> Self {
        self.video = None;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.audio = None;
        self
    }

    pub fn with_fault(mut self, fault: SyntheticFault) -> Self {
        self.faults.push(fault);
        self
    }

    fn has_fault(&self, fault: SyntheticFault) -> bool {
        self.faults.contains(&fault)
    }

    fn streams(&self) -> Vec<StreamInfo> {
        let mut streams = Vec::new();
        if let Some(video) = &self.video {
            streams.push(StreamInfo {
                index: streams.len(),
                kind: MediaKind::Video,
                codec: self.codec_for(MediaKind::Video),
                timing: video.timing(),
                width: video.width,
                height: video.height,
                sample_rate: 0,
                channels: 0,
            });
        }
        if let Some(audio) = &self.audio {
            streams.push(StreamInfo {
                index: streams.len(),
                kind: MediaKind::Audio,
                codec: self.codec_for(MediaKind::Audio),
                timing: audio.timing(),
                width: 0,
                height: 0,
                sample_rate: audio.sample_rate,
                channels: audio.channels,
            });
        }
        streams
    }

    fn codec_for(&self, kind: MediaKind) -> String {
        if self.has_fault(SyntheticFault::MissingDecoder(kind)) {
            return "unknown".into();
        }
        match kind {
            MediaKind::Video => VIDEO_CODEC.into(),
            _ => AUDIO_CODEC.into(),
        }
    }

    /// Interleave both streams by presentation time, video first on ties.
    fn schedule(&self, streams: &[StreamInfo]) -> Vec<SyntheticPacket> {
        let index_of = |kind| streams.iter().find(|s| s.kind == kind).map(|s| s.index);
        let stamp = |kind, pts| {
            (!self.has_fault(SyntheticFault::MissingTimestamps(kind))).then_some(pts)
        };
        let mut timed = Vec::new();

        if let (Some(video), Some(stream)) = (&self.video, index_of(MediaKind::Video)) {
            for ordinal in 0..video.frame_count {
                let key = video.gop == 0 || ordinal % video.gop == 0;
                let pts = stamp(MediaKind::Video, video.pts_of(ordinal));
                timed.push((
                    video.seconds_of(ordinal),
                    0u8,
                    SyntheticPacket {
                        stream,
                        kind: Some(MediaKind::Video),
                        pts,
                        dts: pts,
                        size: if key { 8192 } else { 2048 + (ordinal as usize % 7) * 16 },
                        key,
                        ordinal,
                        frames: 1,
                    },
                ));
            }
        }

        if let (Some(audio), Some(stream)) = (&self.audio, index_of(MediaKind::Audio)) {
            let per_packet = audio.frames_per_packet.max(1);
            for ordinal in (0..audio.frame_count).step_by(per_packet as usize) {
                let frames = per_packet.min(audio.frame_count - ordinal);
                let pts = stamp(MediaKind::Audio, audio.pts_of(ordinal));
                timed.push((
                    audio.seconds_of(ordinal),
                    1u8,
                    SyntheticPacket {
                        stream,
                        kind: Some(MediaKind::Audio),
                        pts,
                        dts: pts,
                        size: 384 * frames as usize,
                        key: true,
                        ordinal,
                        frames,
                    },
                ));
            }
        }

        timed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        timed.into_iter().map(|(_, _, packet)| packet).collect()
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// Codec library serving [`SyntheticSource`]s registered under paths.
#[derive(Debug, Clone, Default)]
pub struct SyntheticLibrary {
    sources: HashMap<PathBuf, Arc<SyntheticSource>>,
}

impl SyntheticLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `path`, builder style.
    pub fn with_source(mut self, path: impl Into<PathBuf>, source: SyntheticSource) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: SyntheticSource) {
        self.sources.insert(path.into(), Arc::new(source));
    }
}

impl CodecLibrary for SyntheticLibrary {
    type Packet = SyntheticPacket;
    type Frame = SyntheticFrame;
    type Container = SyntheticContainer;
    type Decoder = SyntheticDecoder;
    type Converter = SyntheticConverter;
    type Resampler = SyntheticResampler;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open_container(&self, path: &Path) -> Result<SyntheticContainer> {
        let source = self
            .sources
            .get(path)
            .cloned()
            .ok_or_else(|| Error::open_failed(path, "No such file or directory"))?;

        let streams = source.streams();
        let packets = source.schedule(&streams);
        tracing::trace!(
            path = %path.display(),
            streams = streams.len(),
            packets = packets.len(),
            "opened synthetic container"
        );

        Ok(SyntheticContainer {
            source,
            streams,
            packets,
            cursor: 0,
            reads: 0,
        })
    }

    fn open_decoder(
        &self,
        container: &SyntheticContainer,
        stream: &StreamInfo,
        _threads: usize,
    ) -> Result<SyntheticDecoder> {
        let source = &container.source;
        if source.has_fault(SyntheticFault::MissingDecoder(stream.kind)) {
            return Err(Error::CodecNotFound {
                stream: stream.index,
                codec: stream.codec.clone(),
            });
        }
        if source.has_fault(SyntheticFault::DecoderOpenFails(stream.kind)) {
            return Err(Error::decoder_open(stream.index, "Invalid argument"));
        }

        let delay = match stream.kind {
            MediaKind::Video => source.video.as_ref().map_or(0, |v| v.decoder_delay),
            _ => 0,
        };

        Ok(SyntheticDecoder {
            source: Arc::clone(source),
            stream: stream.index,
            kind: stream.kind,
            codec: stream.codec.clone(),
            delay,
            queue: VecDeque::new(),
            awaiting_key: true,
            draining: false,
            frames_out: 0,
        })
    }

    fn make_converter(
        &self,
        decoder: &SyntheticDecoder,
        frame: &SyntheticFrame,
        _scaling: ScalingAlgorithm,
    ) -> Result<SyntheticConverter> {
        if decoder.source.has_fault(SyntheticFault::ConverterUnavailable) {
            return Err(Error::Converter(
                "cannot initialize the conversion context".into(),
            ));
        }
        if frame.kind != Some(MediaKind::Video) || frame.width == 0 || frame.height == 0 {
            return Err(Error::Converter("no video frame to bind the converter to".into()));
        }
        Ok(SyntheticConverter {
            width: frame.width,
            height: frame.height,
        })
    }

    fn make_resampler(
        &self,
        decoder: &SyntheticDecoder,
        frame: &SyntheticFrame,
    ) -> Result<SyntheticResampler> {
        let source = &decoder.source;
        if source.has_fault(SyntheticFault::ResamplerUnavailable) {
            return Err(Error::ResamplerUnavailable(
                "cannot initialize the resampling context".into(),
            ));
        }
        if frame.kind != Some(MediaKind::Audio) {
            return Err(Error::ResamplerUnavailable(
                "no audio frame to bind the resampler to".into(),
            ));
        }
        Ok(SyntheticResampler {
            chunk: source.audio.as_ref().and_then(|a| a.resampler_chunk),
            fails: source.has_fault(SyntheticFault::ResampleFails),
            buffered: VecDeque::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Packets and frames
// ---------------------------------------------------------------------------

/// Reusable packet slot of the synthetic library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticPacket {
    stream: usize,
    kind: Option<MediaKind>,
    pts: Option<i64>,
    dts: Option<i64>,
    size: usize,
    key: bool,
    /// Ordinal of the first frame carried.
    ordinal: u32,
    frames: u32,
}

impl SyntheticPacket {
    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Position of this packet within its stream.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl PacketInfo for SyntheticPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn dts(&self) -> Option<i64> {
        self.dts
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Reusable frame slot of the synthetic library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntheticFrame {
    kind: Option<MediaKind>,
    pts: Option<i64>,
    pkt_dts: Option<i64>,
    key: bool,
    ordinal: u32,
    frame_number: u64,
    packet_size: usize,
    width: u32,
    height: u32,
    channels: u32,
    sample_rate: u32,
    samples: u32,
    line_size: usize,
}

impl SyntheticFrame {
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// Position of the source packet within its stream.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}

impl FrameInfo for SyntheticFrame {
    fn kind(&self) -> Option<MediaKind> {
        self.kind
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn video_observation(&self) -> VideoObservation {
        VideoObservation {
            frame_number: Some(self.frame_number),
            pts: self.pts,
            pkt_dts: self.pkt_dts,
            key_frame: self.key,
            packet_size: (self.packet_size > 0).then_some(self.packet_size),
        }
    }

    fn audio_observation(&self) -> AudioObservation {
        AudioObservation {
            channels: known(self.channels),
            sample_rate: known(self.sample_rate),
            line_size: (self.line_size > 0).then_some(self.line_size),
            samples: known(self.samples),
            pts: self.pts,
            pkt_dts: self.pkt_dts,
            best_effort_ts: self.pts.or(self.pkt_dts),
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// An opened synthetic source.
#[derive(Debug)]
pub struct SyntheticContainer {
    source: Arc<SyntheticSource>,
    streams: Vec<StreamInfo>,
    packets: Vec<SyntheticPacket>,
    cursor: usize,
    reads: usize,
}

impl Container for SyntheticContainer {
    type Packet = SyntheticPacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self, packet: &mut SyntheticPacket) -> Result<ReadStatus> {
        let limit = self.source.faults.iter().find_map(|f| match f {
            SyntheticFault::ReadFails { after_packets } => Some(*after_packets),
            _ => None,
        });
        if limit.is_some_and(|limit| self.reads >= limit) {
            return Err(Error::ReadFailed("I/O error".into()));
        }

        let Some(next) = self.packets.get(self.cursor) else {
            return Ok(ReadStatus::EndOfStream);
        };
        packet.clone_from(next);
        self.cursor += 1;
        self.reads += 1;
        Ok(ReadStatus::Packet)
    }

    fn seek(&mut self, stream: usize, target: i64, direction: SeekDirection) -> Result<()> {
        if self.source.has_fault(SyntheticFault::SeekRejected) {
            return Err(Error::seek_failed(stream, target, "Operation not permitted"));
        }
        if stream >= self.streams.len() {
            return Err(Error::seek_failed(stream, target, "no such stream"));
        }

        let mut keys = self
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.stream == stream && p.key);

        let position = match direction {
            SeekDirection::Backward => {
                let first = keys.clone().next();
                keys.filter(|(_, p)| p.pts.unwrap_or(0) <= target)
                    .last()
                    .or(first)
            }
            SeekDirection::Forward => keys.find(|(_, p)| p.pts.unwrap_or(0) >= target),
        };

        let (index, packet) =
            position.ok_or_else(|| Error::seek_failed(stream, target, "no keyframe in range"))?;
        tracing::trace!(stream, target, landed = ?packet.pts, "synthetic seek");
        self.cursor = index;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decoder for one synthetic stream.
#[derive(Debug)]
pub struct SyntheticDecoder {
    source: Arc<SyntheticSource>,
    stream: usize,
    kind: MediaKind,
    codec: String,
    delay: usize,
    queue: VecDeque<SyntheticFrame>,
    /// Frames referencing data from before a flush cannot be reconstructed.
    awaiting_key: bool,
    draining: bool,
    frames_out: u64,
}

impl SyntheticDecoder {
    fn frames_from(&self, packet: &SyntheticPacket) -> impl Iterator<Item = SyntheticFrame> + '_ {
        let untimed = self
            .source
            .has_fault(SyntheticFault::MissingTimestamps(self.kind));
        let packet = packet.clone();
        (0..packet.frames.max(1)).map(move |i| {
            let ordinal = packet.ordinal + i;
            let mut frame = SyntheticFrame {
                kind: Some(self.kind),
                pts: packet.pts,
                pkt_dts: packet.dts,
                key: packet.key,
                ordinal,
                packet_size: packet.size,
                ..SyntheticFrame::default()
            };
            match self.kind {
                MediaKind::Video => {
                    if let Some(video) = &self.source.video {
                        frame.width = video.width;
                        frame.height = video.height;
                    }
                }
                _ => {
                    if let Some(audio) = &self.source.audio {
                        let width = audio.sample_format.bytes_per_sample();
                        let samples = audio.samples_in(ordinal);
                        if !untimed {
                            frame.pts = Some(audio.pts_of(ordinal));
                        }
                        frame.channels = audio.channels;
                        frame.sample_rate = audio.sample_rate;
                        frame.samples = samples;
                        frame.line_size = if audio.sample_format.is_planar() {
                            samples as usize * width
                        } else {
                            samples as usize * width * audio.channels as usize
                        };
                    }
                }
            }
            frame
        })
    }

    fn output_pending(&self) -> bool {
        self.queue.len() > self.delay
    }
}

impl Decoder for SyntheticDecoder {
    type Packet = SyntheticPacket;
    type Frame = SyntheticFrame;

    fn stream_index(&self) -> usize {
        self.stream
    }

    fn codec_name(&self) -> &str {
        &self.codec
    }

    fn submit(&mut self, packet: &SyntheticPacket) -> Result<()> {
        if packet.stream != self.stream {
            return Err(Error::submit_rejected(
                self.stream,
                format!("packet belongs to stream {}", packet.stream),
            ));
        }
        if self.draining {
            return Err(Error::submit_rejected(self.stream, "End of file"));
        }
        if self.output_pending() {
            return Err(Error::submit_rejected(
                self.stream,
                "Resource temporarily unavailable",
            ));
        }
        let corrupt = SyntheticFault::CorruptPacket {
            kind: self.kind,
            ordinal: packet.ordinal,
        };
        if self.source.has_fault(corrupt) {
            return Err(Error::submit_rejected(
                self.stream,
                "Invalid data found when processing input",
            ));
        }
        if self.awaiting_key && !packet.key {
            return Ok(());
        }
        self.awaiting_key = false;
        let frames: Vec<_> = self.frames_from(packet).collect();
        self.queue.extend(frames);
        Ok(())
    }

    fn submit_end_of_stream(&mut self) -> Result<()> {
        self.draining = true;
        Ok(())
    }

    fn receive(&mut self, frame: &mut SyntheticFrame) -> Result<DecodeStatus> {
        let ready = self.output_pending() || (self.draining && !self.queue.is_empty());
        if !ready {
            return Ok(if self.draining {
                DecodeStatus::EndOfStream
            } else {
                DecodeStatus::NotReady
            });
        }

        let Some(mut next) = self.queue.pop_front() else {
            return Ok(DecodeStatus::NotReady);
        };
        let failure = SyntheticFault::DecodeError {
            kind: self.kind,
            ordinal: next.ordinal,
        };
        if self.source.has_fault(failure) {
            return Err(Error::receive_rejected(
                self.stream,
                "Invalid data found when processing input",
            ));
        }

        next.frame_number = self.frames_out;
        self.frames_out += 1;
        *frame = next;
        Ok(DecodeStatus::Frame)
    }

    fn flush(&mut self) {
        self.queue.clear();
        self.draining = false;
        self.awaiting_key = true;
    }

    fn bit_rate(&self) -> Option<i64> {
        match self.kind {
            MediaKind::Audio => self.source.audio.as_ref().and_then(|a| a.bit_rate),
            _ => None,
        }
    }

    fn sample_format(&self) -> Option<SampleFormat> {
        match self.kind {
            MediaKind::Audio => self.source.audio.as_ref().map(|a| a.sample_format),
            _ => None,
        }
    }

    fn frame_size(&self) -> Option<u32> {
        match self.kind {
            MediaKind::Audio => self.source.audio.as_ref().map(|a| a.samples_per_frame),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Pixel converter writing RGB0 pixels derived from the frame ordinal.
///
/// Red carries the low byte of the ordinal, green and blue the pixel position.
#[derive(Debug)]
pub struct SyntheticConverter {
    width: u32,
    height: u32,
}

impl Converter for SyntheticConverter {
    type Frame = SyntheticFrame;

    fn convert(&mut self, frame: &SyntheticFrame, out: &mut [u8]) -> Result<()> {
        if frame.kind != Some(MediaKind::Video) {
            return Err(Error::Converter("frame slot holds no video frame".into()));
        }
        if frame.width != self.width || frame.height != self.height {
            return Err(Error::Converter(format!(
                "frame is {}x{} but converter is bound to {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * RGB0_BYTES_PER_PIXEL;
        if out.len() != expected {
            return Err(Error::Converter(format!(
                "output holds {} bytes, expected {expected}",
                out.len()
            )));
        }

        let width = self.width as usize;
        for (i, pixel) in out.chunks_exact_mut(RGB0_BYTES_PER_PIXEL).enumerate() {
            pixel[0] = frame.ordinal as u8;
            pixel[1] = (i % width) as u8;
            pixel[2] = (i / width) as u8;
            pixel[3] = 0;
        }
        Ok(())
    }
}

/// Resampler emitting interleaved stereo `f32`.
#[derive(Debug)]
pub struct SyntheticResampler {
    chunk: Option<u32>,
    fails: bool,
    /// Interleaved samples not yet written out.
    buffered: VecDeque<f32>,
}

impl Resampler for SyntheticResampler {
    type Frame = SyntheticFrame;

    fn resample(
        &mut self,
        frame: Option<&SyntheticFrame>,
        out: &mut [u8],
    ) -> Result<ResampleStatus> {
        if self.fails {
            return Err(Error::ResampleFailed("Invalid argument".into()));
        }

        if let Some(frame) = frame {
            let base = frame.pts.unwrap_or(0);
            for i in 0..i64::from(frame.samples) {
                let value = ((base + i) % 1000) as f32 / 1000.0;
                self.buffered.push_back(value);
                self.buffered.push_back(-value);
            }
        }

        const STEREO_F32: usize = 2 * std::mem::size_of::<f32>();
        let mut samples = (out.len() / STEREO_F32).min(self.buffered.len() / 2);
        if let Some(chunk) = self.chunk {
            samples = samples.min(chunk as usize);
        }

        let written = samples * STEREO_F32;
        for slot in out[..written].chunks_exact_mut(std::mem::size_of::<f32>()) {
            let value = self.buffered.pop_front().unwrap_or_default();
            slot.copy_from_slice(&value.to_le_bytes());
        }

        Ok(ResampleStatus {
            written,
            pending: !self.buffered.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PATH: &str = "/media/clip.mkv";

    fn library(source: SyntheticSource) -> SyntheticLibrary {
        SyntheticLibrary::new().with_source(PATH, source)
    }

    fn read_all(container: &mut SyntheticContainer) -> Vec<SyntheticPacket> {
        let mut packet = SyntheticPacket::default();
        let mut packets = Vec::new();
        while container.read_packet(&mut packet).unwrap() == ReadStatus::Packet {
            packets.push(packet.clone());
        }
        packets
    }

    #[test]
    fn unknown_path_fails_to_open() {
        let err = SyntheticLibrary::new()
            .open_container(Path::new("/nope.mkv"))
            .unwrap_err();
        assert_matches!(err, Error::OpenFailed { .. });
    }

    #[test]
    fn clip_streams_and_timing() {
        let lib = library(SyntheticSource::clip(10, 30));
        let container = lib.open_container(Path::new(PATH)).unwrap();
        let streams = container.streams();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].kind, MediaKind::Video);
        assert_eq!(streams[0].timing.frame_interval(), Some(512));
        assert_eq!(streams[0].timing.duration, Some(300 * 512));
        assert_eq!(streams[1].kind, MediaKind::Audio);
        assert!(!streams[1].timing.avg_frame_rate.is_valid());
    }

    #[test]
    fn schedule_interleaves_by_time() {
        let lib = library(SyntheticSource::clip(1, 30));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let packets = read_all(&mut container);

        let video = packets.iter().filter(|p| p.stream_index() == 0).count();
        let audio = packets.iter().filter(|p| p.stream_index() == 1).count();
        assert_eq!(video, 30);
        assert_eq!(audio, 47);

        // Packets of each stream stay in pts order.
        for stream in [0, 1] {
            let pts: Vec<_> = packets
                .iter()
                .filter(|p| p.stream_index() == stream)
                .filter_map(|p| p.pts())
                .collect();
            assert!(pts.windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(
            container.read_packet(&mut SyntheticPacket::default()).unwrap(),
            ReadStatus::EndOfStream
        );
    }

    #[test]
    fn backward_seek_lands_on_preceding_keyframe() {
        let lib = library(SyntheticSource::clip(10, 30));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        container.seek(0, 45 * 512, SeekDirection::Backward).unwrap();

        let mut packet = SyntheticPacket::default();
        container.read_packet(&mut packet).unwrap();
        assert_eq!(packet.stream_index(), 0);
        assert_eq!(packet.pts(), Some(30 * 512));
        assert!(packet.is_key());
    }

    #[test]
    fn forward_seek_lands_on_following_keyframe() {
        let lib = library(SyntheticSource::clip(10, 30));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        container.seek(0, 45 * 512, SeekDirection::Forward).unwrap();

        let mut packet = SyntheticPacket::default();
        container.read_packet(&mut packet).unwrap();
        assert_eq!(packet.pts(), Some(60 * 512));

        let err = container
            .seek(0, 10_000 * 512, SeekDirection::Forward)
            .unwrap_err();
        assert_matches!(err, Error::SeekFailed { .. });
    }

    #[test]
    fn rejected_seek() {
        let lib = library(SyntheticSource::clip(1, 30).with_fault(SyntheticFault::SeekRejected));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        assert_matches!(
            container.seek(0, 0, SeekDirection::Backward),
            Err(Error::SeekFailed { stream: 0, target: 0, .. })
        );
    }

    #[test]
    fn decoder_delay_reports_not_ready() {
        let lib = library(SyntheticSource::clip(1, 30).without_audio());
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let mut packet = SyntheticPacket::default();
        let mut frame = SyntheticFrame::default();
        let mut statuses = Vec::new();
        for _ in 0..3 {
            container.read_packet(&mut packet).unwrap();
            decoder.submit(&packet).unwrap();
            statuses.push(decoder.receive(&mut frame).unwrap());
        }
        assert_eq!(
            statuses,
            vec![DecodeStatus::NotReady, DecodeStatus::NotReady, DecodeStatus::Frame]
        );
        assert_eq!(frame.pts(), Some(0));
        assert_eq!(frame.video_observation().frame_number, Some(0));
    }

    #[test]
    fn drain_after_end_of_stream() {
        let lib = library(SyntheticSource::clip(1, 30).without_audio());
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let mut packet = SyntheticPacket::default();
        container.read_packet(&mut packet).unwrap();
        decoder.submit(&packet).unwrap();
        decoder.submit_end_of_stream().unwrap();

        let mut frame = SyntheticFrame::default();
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::Frame);
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::EndOfStream);
        assert_matches!(decoder.submit(&packet), Err(Error::SubmitRejected { .. }));

        decoder.flush();
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::NotReady);
    }

    #[test]
    fn decoder_skips_until_keyframe_after_flush() {
        let lib = library(SyntheticSource::clip(2, 30).without_audio());
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let mut packet = SyntheticPacket::default();
        container.read_packet(&mut packet).unwrap();
        container.read_packet(&mut packet).unwrap();
        assert!(!packet.is_key());
        decoder.submit(&packet).unwrap();
        decoder.submit_end_of_stream().unwrap();

        let mut frame = SyntheticFrame::default();
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::EndOfStream);
    }

    #[test]
    fn missing_decoder() {
        let lib = library(
            SyntheticSource::clip(1, 30)
                .with_fault(SyntheticFault::MissingDecoder(MediaKind::Audio)),
        );
        let container = lib.open_container(Path::new(PATH)).unwrap();
        let audio = container.streams()[1].clone();
        assert_eq!(audio.codec, "unknown");
        assert_matches!(
            lib.open_decoder(&container, &audio, 0),
            Err(Error::CodecNotFound { stream: 1, .. })
        );
    }

    #[test]
    fn converter_encodes_ordinal() {
        let lib = library(SyntheticSource::clip(1, 30).without_audio());
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let mut packet = SyntheticPacket::default();
        let mut frame = SyntheticFrame::default();
        while decoder.receive(&mut frame).unwrap() != DecodeStatus::Frame {
            container.read_packet(&mut packet).unwrap();
            decoder.submit(&packet).unwrap();
        }

        let mut converter = lib
            .make_converter(&decoder, &frame, ScalingAlgorithm::Bilinear)
            .unwrap();
        let mut out = vec![0u8; 320 * 240 * 4];
        converter.convert(&frame, &mut out).unwrap();
        assert_eq!(out[0], 0);
        assert_eq!(&out[4..8], &[0, 1, 0, 0]);

        let mut short = vec![0u8; 16];
        assert_matches!(converter.convert(&frame, &mut short), Err(Error::Converter(_)));
    }

    #[test]
    fn multi_frame_packets_refuse_input_while_output_pending() {
        let audio = SyntheticAudio {
            frames_per_packet: 3,
            ..SyntheticAudio::default()
        };
        let lib = library(SyntheticSource::clip(1, 30).without_video().with_audio(audio));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let packets = read_all(&mut container);
        assert_eq!(packets.len(), 16);
        assert_eq!(packets[1].pts(), Some(3 * 1024));

        let mut frame = SyntheticFrame::default();
        decoder.submit(&packets[0]).unwrap();
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::Frame);
        assert_matches!(decoder.submit(&packets[1]), Err(Error::SubmitRejected { .. }));

        let mut pts = vec![frame.pts()];
        while decoder.receive(&mut frame).unwrap() == DecodeStatus::Frame {
            pts.push(frame.pts());
        }
        assert_eq!(pts, vec![Some(0), Some(1024), Some(2048)]);
        decoder.submit(&packets[1]).unwrap();
    }

    #[test]
    fn start_pts_offsets_the_timeline() {
        let video = SyntheticVideo {
            start_pts: 5120,
            ..SyntheticVideo::default()
        };
        let lib = library(SyntheticSource::default().with_video(video));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        assert_eq!(container.streams()[0].timing.start_time, Some(5120));

        container.seek(0, 0, SeekDirection::Backward).unwrap();
        let mut packet = SyntheticPacket::default();
        container.read_packet(&mut packet).unwrap();
        assert_eq!(packet.pts(), Some(5120));
    }

    #[test]
    fn missing_timestamps() {
        let lib = library(
            SyntheticSource::clip(1, 30)
                .with_fault(SyntheticFault::MissingTimestamps(MediaKind::Video)),
        );
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let packets = read_all(&mut container);
        assert!(packets
            .iter()
            .filter(|p| p.stream_index() == 0)
            .all(|p| p.pts().is_none() && p.dts().is_none()));
        assert!(packets
            .iter()
            .filter(|p| p.stream_index() == 1)
            .all(|p| p.pts().is_some()));
    }

    #[test]
    fn resampler_chunks_and_drains() {
        let audio = SyntheticAudio {
            resampler_chunk: Some(256),
            ..SyntheticAudio::default()
        };
        let lib = library(SyntheticSource::clip(1, 30).without_video().with_audio(audio));
        let mut container = lib.open_container(Path::new(PATH)).unwrap();
        let stream = container.streams()[0].clone();
        let mut decoder = lib.open_decoder(&container, &stream, 0).unwrap();

        let mut packet = SyntheticPacket::default();
        let mut frame = SyntheticFrame::default();
        container.read_packet(&mut packet).unwrap();
        decoder.submit(&packet).unwrap();
        assert_eq!(decoder.receive(&mut frame).unwrap(), DecodeStatus::Frame);

        let mut resampler = lib.make_resampler(&decoder, &frame).unwrap();
        let mut out = vec![0u8; 1024 * 8];
        let first = resampler.resample(Some(&frame), &mut out).unwrap();
        assert_eq!(first.written, 256 * 8);
        assert!(first.pending);

        let mut offset = first.written;
        let mut pending = first.pending;
        while pending {
            let step = resampler.resample(None, &mut out[offset..]).unwrap();
            offset += step.written;
            pending = step.pending;
        }
        assert_eq!(offset, 1024 * 8);
    }
}
