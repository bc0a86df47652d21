//! Native FFmpeg backend using ffmpeg-the-third bindings.
//!
//! Direct library access without subprocess spawning. Requires the
//! `native-ffmpeg` feature and FFmpeg development libraries.

use std::path::Path;
use std::sync::OnceLock;

use ffmpeg_the_third as ffmpeg;
use ffmpeg_the_third::codec::context::Context as CodecContext;
use ffmpeg_the_third::format::sample::Type as SampleLayout;
use ffmpeg_the_third::software::resampling::Context as ResamplerContext;
use ffmpeg_the_third::software::scaling::{Context as ScalerContext, Flags as ScalerFlags};

use mr_core::facts::known;
use mr_core::{
    AudioObservation, Error, MediaKind, Rational, Result, SampleFormat, ScalingAlgorithm,
    SeekDirection, StreamTiming, VideoObservation, RGB0_BYTES_PER_PIXEL,
};

use crate::library::{
    CodecLibrary, Container, Converter, DecodeStatus, Decoder, FrameInfo, PacketInfo, ReadStatus,
    ResampleStatus, Resampler, StreamInfo,
};

static FFMPEG_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

fn init_ffmpeg() -> Result<()> {
    FFMPEG_INIT
        .get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| Error::ReadFailed(format!("FFmpeg init failed: {e}")))
}

fn rational(value: ffmpeg::Rational) -> Rational {
    Rational::new(value.numerator(), value.denominator())
}

fn timestamp(value: i64) -> Option<i64> {
    (value != ffmpeg::ffi::AV_NOPTS_VALUE).then_some(value)
}

fn sample_format(format: ffmpeg::format::Sample) -> Option<SampleFormat> {
    use ffmpeg::format::Sample;
    let planar = |layout: SampleLayout| layout == SampleLayout::Planar;
    Some(match format {
        Sample::U8(l) if planar(l) => SampleFormat::U8p,
        Sample::U8(_) => SampleFormat::U8,
        Sample::I16(l) if planar(l) => SampleFormat::S16p,
        Sample::I16(_) => SampleFormat::S16,
        Sample::I32(l) if planar(l) => SampleFormat::S32p,
        Sample::I32(_) => SampleFormat::S32,
        Sample::I64(l) if planar(l) => SampleFormat::S64p,
        Sample::I64(_) => SampleFormat::S64,
        Sample::F32(l) if planar(l) => SampleFormat::Fltp,
        Sample::F32(_) => SampleFormat::Flt,
        Sample::F64(l) if planar(l) => SampleFormat::Dblp,
        Sample::F64(_) => SampleFormat::Dbl,
        Sample::None => return None,
    })
}

fn scaler_flags(scaling: ScalingAlgorithm) -> ScalerFlags {
    match scaling {
        ScalingAlgorithm::FastBilinear => ScalerFlags::FAST_BILINEAR,
        ScalingAlgorithm::Bilinear => ScalerFlags::BILINEAR,
        ScalingAlgorithm::Bicubic => ScalerFlags::BICUBIC,
        ScalingAlgorithm::Point => ScalerFlags::POINT,
    }
}

/// Codec library backed by the system FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLibrary;

impl FfmpegLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl CodecLibrary for FfmpegLibrary {
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;
    type Container = FfmpegContainer;
    type Decoder = FfmpegDecoder;
    type Converter = FfmpegConverter;
    type Resampler = FfmpegResampler;

    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open_container(&self, path: &Path) -> Result<FfmpegContainer> {
        init_ffmpeg()?;

        let input = ffmpeg::format::input(path).map_err(|e| Error::open_failed(path, e))?;

        let mut streams = Vec::new();
        for stream in input.streams() {
            let ctx = CodecContext::from_parameters(stream.parameters())
                .map_err(|e| Error::open_failed(path, e))?;
            let kind = match ctx.medium() {
                ffmpeg::media::Type::Video => MediaKind::Video,
                ffmpeg::media::Type::Audio => MediaKind::Audio,
                ffmpeg::media::Type::Subtitle => MediaKind::Subtitle,
                _ => MediaKind::Data,
            };

            // SAFETY: ctx owns a valid AVCodecContext populated from the stream parameters.
            let (width, height, sample_rate, channels) = unsafe {
                let raw = ctx.as_ptr();
                (
                    (*raw).width.max(0) as u32,
                    (*raw).height.max(0) as u32,
                    (*raw).sample_rate.max(0) as u32,
                    (*raw).ch_layout.nb_channels.max(0) as u32,
                )
            };

            streams.push(StreamInfo {
                index: stream.index(),
                kind,
                codec: ctx.id().name().to_string(),
                timing: StreamTiming {
                    time_base: rational(stream.time_base()),
                    avg_frame_rate: rational(stream.avg_frame_rate()),
                    duration: timestamp(stream.duration()).filter(|d| *d > 0),
                    start_time: timestamp(stream.start_time()),
                    frame_count: Some(stream.frames()).filter(|n| *n > 0),
                },
                width,
                height,
                sample_rate,
                channels,
            });
        }

        tracing::debug!(path = %path.display(), streams = streams.len(), "opened container");
        Ok(FfmpegContainer { input, streams })
    }

    fn open_decoder(
        &self,
        container: &FfmpegContainer,
        stream: &StreamInfo,
        threads: usize,
    ) -> Result<FfmpegDecoder> {
        let source = container
            .input
            .stream(stream.index)
            .ok_or_else(|| Error::decoder_open(stream.index, "stream not found"))?;
        let mut ctx = CodecContext::from_parameters(source.parameters())
            .map_err(|e| Error::decoder_open(stream.index, e))?;

        if threads > 0 {
            // SAFETY: ctx is a valid, not yet opened codec context.
            unsafe {
                (*ctx.as_mut_ptr()).thread_count = threads as i32;
            }
        }

        let map_open = |e: ffmpeg::Error| match e {
            ffmpeg::Error::DecoderNotFound => Error::CodecNotFound {
                stream: stream.index,
                codec: stream.codec.clone(),
            },
            other => Error::decoder_open(stream.index, other),
        };

        let inner = match stream.kind {
            MediaKind::Video => DecoderKind::Video(ctx.decoder().video().map_err(map_open)?),
            MediaKind::Audio => DecoderKind::Audio(ctx.decoder().audio().map_err(map_open)?),
            other => {
                return Err(Error::decoder_open(
                    stream.index,
                    format!("{other} streams are not decoded"),
                ))
            }
        };

        Ok(FfmpegDecoder {
            stream: stream.index,
            codec: stream.codec.clone(),
            inner,
            frames_out: 0,
            last_packet_size: 0,
        })
    }

    fn make_converter(
        &self,
        _decoder: &FfmpegDecoder,
        frame: &FfmpegFrame,
        scaling: ScalingAlgorithm,
    ) -> Result<FfmpegConverter> {
        let source = &frame.video;
        let scaler = ScalerContext::get(
            source.format(),
            source.width(),
            source.height(),
            ffmpeg::format::Pixel::RGBZ,
            source.width(),
            source.height(),
            scaler_flags(scaling),
        )
        .map_err(|e| Error::Converter(e.to_string()))?;

        Ok(FfmpegConverter {
            scaler,
            scaled: ffmpeg::frame::Video::empty(),
        })
    }

    fn make_resampler(
        &self,
        _decoder: &FfmpegDecoder,
        frame: &FfmpegFrame,
    ) -> Result<FfmpegResampler> {
        let source = &frame.audio;
        let context = ResamplerContext::get2(
            source.format(),
            source.ch_layout(),
            source.rate(),
            ffmpeg::format::Sample::F32(SampleLayout::Packed),
            ffmpeg::ChannelLayout::STEREO,
            source.rate(),
        )
        .map_err(|e| Error::ResamplerUnavailable(e.to_string()))?;

        Ok(FfmpegResampler {
            context,
            converted: ffmpeg::frame::Audio::empty(),
            pending: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Packets and frames
// ---------------------------------------------------------------------------

/// Reusable packet slot.
pub struct FfmpegPacket(ffmpeg::Packet);

impl Default for FfmpegPacket {
    fn default() -> Self {
        Self(ffmpeg::Packet::empty())
    }
}

impl PacketInfo for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }

    fn pts(&self) -> Option<i64> {
        self.0.pts()
    }

    fn dts(&self) -> Option<i64> {
        self.0.dts()
    }

    fn size(&self) -> usize {
        self.0.size()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Reusable frame slot; holds whichever kind the last decoder produced.
pub struct FfmpegFrame {
    kind: Option<MediaKind>,
    video: ffmpeg::frame::Video,
    audio: ffmpeg::frame::Audio,
    frame_number: u64,
    packet_size: usize,
}

impl Default for FfmpegFrame {
    fn default() -> Self {
        Self {
            kind: None,
            video: ffmpeg::frame::Video::empty(),
            audio: ffmpeg::frame::Audio::empty(),
            frame_number: 0,
            packet_size: 0,
        }
    }
}

impl FrameInfo for FfmpegFrame {
    fn kind(&self) -> Option<MediaKind> {
        self.kind
    }

    fn width(&self) -> u32 {
        match self.kind {
            Some(MediaKind::Video) => self.video.width(),
            _ => 0,
        }
    }

    fn height(&self) -> u32 {
        match self.kind {
            Some(MediaKind::Video) => self.video.height(),
            _ => 0,
        }
    }

    fn video_observation(&self) -> VideoObservation {
        // SAFETY: the frame wrapper always owns an allocated AVFrame.
        let pkt_dts = unsafe { (*self.video.as_ptr()).pkt_dts };
        VideoObservation {
            frame_number: Some(self.frame_number),
            pts: self.video.pts(),
            pkt_dts: timestamp(pkt_dts),
            key_frame: self.video.is_key(),
            packet_size: (self.packet_size > 0).then_some(self.packet_size),
        }
    }

    fn audio_observation(&self) -> AudioObservation {
        // SAFETY: the frame wrapper always owns an allocated AVFrame.
        let (pkt_dts, best_effort, line_size) = unsafe {
            let raw = self.audio.as_ptr();
            (
                (*raw).pkt_dts,
                (*raw).best_effort_timestamp,
                (*raw).linesize[0],
            )
        };
        AudioObservation {
            channels: known(self.audio.ch_layout().channels()),
            sample_rate: known(self.audio.rate()),
            line_size: (line_size > 0).then_some(line_size as usize),
            samples: known(self.audio.samples() as u32),
            pts: self.audio.pts(),
            pkt_dts: timestamp(pkt_dts),
            best_effort_ts: timestamp(best_effort),
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// An opened FFmpeg input context.
pub struct FfmpegContainer {
    input: ffmpeg::format::context::Input,
    streams: Vec<StreamInfo>,
}

impl Container for FfmpegContainer {
    type Packet = FfmpegPacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self, packet: &mut FfmpegPacket) -> Result<ReadStatus> {
        match packet.0.read(&mut self.input) {
            Ok(()) => Ok(ReadStatus::Packet),
            Err(ffmpeg::Error::Eof) => Ok(ReadStatus::EndOfStream),
            Err(e) => Err(Error::ReadFailed(e.to_string())),
        }
    }

    fn seek(&mut self, stream: usize, target: i64, direction: SeekDirection) -> Result<()> {
        let flags = match direction {
            SeekDirection::Backward => ffmpeg::ffi::AVSEEK_FLAG_BACKWARD as i32,
            SeekDirection::Forward => 0,
        };
        // SAFETY: the input context is open for the lifetime of self.
        let ret = unsafe {
            ffmpeg::ffi::av_seek_frame(self.input.as_mut_ptr(), stream as i32, target, flags)
        };
        if ret < 0 {
            return Err(Error::seek_failed(stream, target, ffmpeg::Error::from(ret)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

enum DecoderKind {
    Video(ffmpeg::decoder::Video),
    Audio(ffmpeg::decoder::Audio),
}

/// An opened FFmpeg decoder bound to one stream.
pub struct FfmpegDecoder {
    stream: usize,
    codec: String,
    inner: DecoderKind,
    frames_out: u64,
    last_packet_size: usize,
}

impl FfmpegDecoder {
    fn opened(&mut self) -> &mut ffmpeg::decoder::Opened {
        match &mut self.inner {
            DecoderKind::Video(video) => video,
            DecoderKind::Audio(audio) => audio,
        }
    }
}

impl Decoder for FfmpegDecoder {
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;

    fn stream_index(&self) -> usize {
        self.stream
    }

    fn codec_name(&self) -> &str {
        &self.codec
    }

    fn submit(&mut self, packet: &FfmpegPacket) -> Result<()> {
        let stream = self.stream;
        self.last_packet_size = packet.0.size();
        self.opened()
            .send_packet(&packet.0)
            .map_err(|e| Error::submit_rejected(stream, e))
    }

    fn submit_end_of_stream(&mut self) -> Result<()> {
        let stream = self.stream;
        self.opened()
            .send_eof()
            .map_err(|e| Error::submit_rejected(stream, e))
    }

    fn receive(&mut self, frame: &mut FfmpegFrame) -> Result<DecodeStatus> {
        let (result, kind) = match &mut self.inner {
            DecoderKind::Video(video) => (video.receive_frame(&mut frame.video), MediaKind::Video),
            DecoderKind::Audio(audio) => (audio.receive_frame(&mut frame.audio), MediaKind::Audio),
        };

        match result {
            Ok(()) => {
                frame.kind = Some(kind);
                frame.frame_number = self.frames_out;
                frame.packet_size = self.last_packet_size;
                self.frames_out += 1;
                Ok(DecodeStatus::Frame)
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(DecodeStatus::NotReady)
            }
            Err(ffmpeg::Error::Eof) => Ok(DecodeStatus::EndOfStream),
            Err(e) => Err(Error::receive_rejected(self.stream, e)),
        }
    }

    fn flush(&mut self) {
        self.opened().flush();
    }

    fn bit_rate(&self) -> Option<i64> {
        let rate = match &self.inner {
            DecoderKind::Video(video) => video.bit_rate(),
            DecoderKind::Audio(audio) => audio.bit_rate(),
        };
        known(rate as i64)
    }

    fn sample_format(&self) -> Option<SampleFormat> {
        match &self.inner {
            DecoderKind::Audio(audio) => sample_format(audio.format()),
            DecoderKind::Video(_) => None,
        }
    }

    fn frame_size(&self) -> Option<u32> {
        match &self.inner {
            DecoderKind::Audio(audio) => known(audio.frame_size()),
            DecoderKind::Video(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// swscale context converting to RGB0 at the source size.
pub struct FfmpegConverter {
    scaler: ScalerContext,
    scaled: ffmpeg::frame::Video,
}

impl Converter for FfmpegConverter {
    type Frame = FfmpegFrame;

    fn convert(&mut self, frame: &FfmpegFrame, out: &mut [u8]) -> Result<()> {
        self.scaler
            .run(&frame.video, &mut self.scaled)
            .map_err(|e| Error::Converter(e.to_string()))?;

        let row = self.scaled.width() as usize * RGB0_BYTES_PER_PIXEL;
        let rows = self.scaled.height() as usize;
        if out.len() != row * rows {
            return Err(Error::Converter(format!(
                "output holds {} bytes, expected {}",
                out.len(),
                row * rows
            )));
        }

        // Scaled rows may be padded; copy them tightly.
        let stride = self.scaled.stride(0);
        let plane = self.scaled.data(0);
        for (y, dest) in out.chunks_exact_mut(row).enumerate() {
            let start = y * stride;
            dest.copy_from_slice(&plane[start..start + row]);
        }
        Ok(())
    }
}

/// swresample context converting to interleaved stereo `f32`.
pub struct FfmpegResampler {
    context: ResamplerContext,
    converted: ffmpeg::frame::Audio,
    /// Converted bytes that did not fit the caller's buffer yet.
    pending: Vec<u8>,
}

impl FfmpegResampler {
    fn take_converted(&mut self) {
        const STEREO_F32: usize = 2 * std::mem::size_of::<f32>();
        let bytes = self.converted.samples() * STEREO_F32;
        if bytes > 0 {
            self.pending.extend_from_slice(&self.converted.data(0)[..bytes]);
        }
    }
}

impl Resampler for FfmpegResampler {
    type Frame = FfmpegFrame;

    fn resample(
        &mut self,
        frame: Option<&FfmpegFrame>,
        out: &mut [u8],
    ) -> Result<ResampleStatus> {
        let delay = match frame {
            Some(frame) => self.context.run(&frame.audio, &mut self.converted),
            None => self.context.flush(&mut self.converted),
        }
        .map_err(|e| Error::ResampleFailed(e.to_string()))?;
        self.take_converted();

        let written = out.len().min(self.pending.len());
        out[..written].copy_from_slice(&self.pending[..written]);
        self.pending.drain(..written);

        Ok(ResampleStatus {
            written,
            pending: !self.pending.is_empty() || delay.is_some_and(|d| d.output > 0),
        })
    }
}
