//! The codec library contract.
//!
//! A [`CodecLibrary`] opens containers and builds the per-stream handles the
//! reader drives: a [`Container`] to pull packets from and reposition, one
//! [`Decoder`] per stream, a lazily built [`Converter`] for pixels and a
//! lazily built [`Resampler`] for samples. Packets and frames live in
//! single reusable slots owned by the caller; every call overwrites them in
//! place, so callers copy out whatever they need before the next step.
//!
//! Handles release their native resources when dropped.

use std::path::Path;

use mr_core::{
    AudioObservation, MediaKind, Result, SampleFormat, ScalingAlgorithm, SeekDirection,
    StreamTiming, VideoObservation,
};

/// Description of one stream as enumerated when the container was opened.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    /// Codec name as reported by the container.
    pub codec: String,
    pub timing: StreamTiming,
    /// Video dimensions; zero for non-video streams.
    pub width: u32,
    pub height: u32,
    /// Audio shape; zero for non-audio streams.
    pub sample_rate: u32,
    pub channels: u32,
}

/// Outcome of pulling the next packet from a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The packet slot now holds a new packet.
    Packet,
    /// The source is exhausted.
    EndOfStream,
}

/// Outcome of asking a decoder for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The frame slot now holds a new frame.
    Frame,
    /// The decoder needs more input before it can produce a frame.
    NotReady,
    /// The decoder has been drained and will produce nothing more.
    EndOfStream,
}

/// Outcome of one resample step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResampleStatus {
    /// Bytes written into the output slice.
    pub written: usize,
    /// The resampler still buffers samples that did not fit.
    pub pending: bool,
}

/// Read access to the reusable packet slot.
pub trait PacketInfo: Default {
    fn stream_index(&self) -> usize;
    fn pts(&self) -> Option<i64>;
    fn dts(&self) -> Option<i64>;
    fn size(&self) -> usize;
    /// Release the packet payload, leaving an empty slot.
    fn clear(&mut self);
}

/// Read access to the reusable frame slot.
pub trait FrameInfo: Default {
    /// The kind of the frame currently held, `None` once released.
    fn kind(&self) -> Option<MediaKind>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn video_observation(&self) -> VideoObservation;
    fn audio_observation(&self) -> AudioObservation;
    /// Release the frame's data, leaving an empty slot.
    fn clear(&mut self);
}

/// An opened source.
pub trait Container {
    type Packet: PacketInfo;

    fn streams(&self) -> &[StreamInfo];

    /// Pull the next packet of any stream into `packet`.
    fn read_packet(&mut self, packet: &mut Self::Packet) -> Result<ReadStatus>;

    /// Reposition so the next packet of `stream` is the nearest accessible one
    /// on the `direction` side of `target` (stream timebase units).
    fn seek(&mut self, stream: usize, target: i64, direction: SeekDirection) -> Result<()>;
}

/// A decoder bound to one stream.
pub trait Decoder {
    type Packet: PacketInfo;
    type Frame: FrameInfo;

    fn stream_index(&self) -> usize;
    fn codec_name(&self) -> &str;

    fn submit(&mut self, packet: &Self::Packet) -> Result<()>;

    /// Signal that no more packets will follow, so buffered frames drain out.
    fn submit_end_of_stream(&mut self) -> Result<()>;

    fn receive(&mut self, frame: &mut Self::Frame) -> Result<DecodeStatus>;

    /// Drop all buffered state, as required after a container seek.
    fn flush(&mut self);

    fn bit_rate(&self) -> Option<i64>;
    fn sample_format(&self) -> Option<SampleFormat>;
    /// Samples per audio frame when the codec fixes it.
    fn frame_size(&self) -> Option<u32>;
}

/// Converts decoded video frames into tightly packed RGB0.
pub trait Converter {
    type Frame: FrameInfo;

    /// `out` is exactly `width * height * 4` bytes.
    fn convert(&mut self, frame: &Self::Frame, out: &mut [u8]) -> Result<()>;
}

/// Converts decoded audio frames into interleaved stereo `f32`.
pub trait Resampler {
    type Frame: FrameInfo;

    /// Feed `frame` (or nothing, to drain) and write converted samples to `out`.
    fn resample(&mut self, frame: Option<&Self::Frame>, out: &mut [u8]) -> Result<ResampleStatus>;
}

/// Entry point of a codec library backend.
pub trait CodecLibrary {
    type Packet: PacketInfo;
    type Frame: FrameInfo;
    type Container: Container<Packet = Self::Packet>;
    type Decoder: Decoder<Packet = Self::Packet, Frame = Self::Frame>;
    type Converter: Converter<Frame = Self::Frame>;
    type Resampler: Resampler<Frame = Self::Frame>;

    /// Human-readable name identifying this backend.
    fn name(&self) -> &'static str;

    fn open_container(&self, path: &Path) -> Result<Self::Container>;

    /// Build and open a decoder for `stream`. Returns
    /// [`mr_core::Error::CodecNotFound`] when the library has no decoder for it.
    fn open_decoder(
        &self,
        container: &Self::Container,
        stream: &StreamInfo,
        threads: usize,
    ) -> Result<Self::Decoder>;

    /// Build a converter bound to the shape and pixel format of `frame`.
    fn make_converter(
        &self,
        decoder: &Self::Decoder,
        frame: &Self::Frame,
        scaling: ScalingAlgorithm,
    ) -> Result<Self::Converter>;

    /// Build a resampler from the layout of `frame` to interleaved stereo `f32`.
    fn make_resampler(&self, decoder: &Self::Decoder, frame: &Self::Frame)
        -> Result<Self::Resampler>;
}
