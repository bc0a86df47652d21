//! Turning the decoded frame into caller-owned buffers.
//!
//! Video frames become tightly packed RGB0 (`width * height * 4` bytes).
//! Audio frames become interleaved stereo `f32`, in a buffer sized from the
//! tracked audio facts as `channels × samples × bytes_per_sample`, where the
//! sample width is that of the packed form of the decoder's native format.

use std::path::Path;

use mr_codec::{CodecLibrary, Converter, FrameInfo, Resampler};
use mr_core::{Error, MediaKind, Result, OUTPUT_CHANNELS, RGB0_BYTES_PER_PIXEL};

use crate::pipeline::Step;
use crate::state::ReaderState;

/// Scratch space the resampler drains into once the output buffer is full.
const OVERFLOW_SCRATCH: usize = 4096;

/// One converted video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBuffer {
    pub width: u32,
    pub height: u32,
    pub pts: Option<i64>,
    /// RGB0 pixels, row-major, no padding.
    pub data: Vec<u8>,
}

/// One converted audio frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Always two: the output layout is stereo.
    pub channels: u32,
    pub sample_rate: Option<u32>,
    pub pts: Option<i64>,
    /// Bytes the resampler actually produced; the rest of `data` is zero.
    pub written: usize,
    /// Interleaved little-endian `f32` samples.
    pub data: Vec<u8>,
}

impl<L: CodecLibrary> ReaderState<L> {
    /// Convert the current video frame to RGB0 and release it.
    ///
    /// A second call without an intervening advance returns
    /// [`Error::NoDataAvailable`].
    pub fn produce_video_buffer(&mut self) -> Result<VideoBuffer> {
        let scaling = self.config.scaling;
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let slot = source.video.as_ref().ok_or(Error::NoVideoStream)?;

        let frame = &mut source.frame;
        if frame.kind() != Some(MediaKind::Video) {
            return Err(Error::NoDataAvailable);
        }

        if source.converter.is_none() {
            tracing::debug!(
                width = frame.width(),
                height = frame.height(),
                %scaling,
                "creating pixel converter"
            );
            let converter = self.library.make_converter(&slot.decoder, frame, scaling)?;
            source.converter = Some(converter);
        }
        let Some(converter) = source.converter.as_mut() else {
            return Err(Error::Converter("converter was not created".into()));
        };

        let (width, height) = (frame.width(), frame.height());
        let mut data = vec![0u8; width as usize * height as usize * RGB0_BYTES_PER_PIXEL];
        converter.convert(frame, &mut data)?;
        frame.clear();

        Ok(VideoBuffer {
            width,
            height,
            pts: source.video_facts.presentation_ts(),
            data,
        })
    }

    /// Resample the current audio frame into interleaved stereo `f32`.
    ///
    /// Returns [`Error::NoDataAvailable`] when the buffer size is not known
    /// yet or no audio frame was decoded since the last call.
    pub fn produce_audio_buffer(&mut self) -> Result<AudioBuffer> {
        let size = self.audio_buffer_size()?;
        let source = self.source.as_mut().ok_or(Error::NotOpen)?;
        let slot = source.audio.as_ref().ok_or(Error::NoAudioStream)?;

        let size = size.ok_or(Error::NoDataAvailable)?;
        if source.audio_produced == Some(source.audio_generation)
            || source.frame.kind() != Some(MediaKind::Audio)
        {
            return Err(Error::NoDataAvailable);
        }

        if source.resampler.is_none() {
            tracing::debug!(
                stream = slot.index(),
                channels = ?source.audio_facts.channels,
                sample_rate = ?source.audio_facts.sample_rate,
                "creating resampler"
            );
            let resampler = self.library.make_resampler(&slot.decoder, &source.frame)?;
            source.resampler = Some(resampler);
        }
        let Some(resampler) = source.resampler.as_mut() else {
            return Err(Error::ResamplerUnavailable("resampler was not created".into()));
        };

        let mut data = vec![0u8; size];
        let status = resampler.resample(Some(&source.frame), &mut data)?;
        let mut written = status.written;
        let mut pending = status.pending;
        let mut dropped = 0usize;
        let mut scratch = [0u8; OVERFLOW_SCRATCH];

        while pending {
            let step = if written < data.len() {
                let step = resampler.resample(None, &mut data[written..])?;
                written += step.written;
                step
            } else {
                let step = resampler.resample(None, &mut scratch)?;
                dropped += step.written;
                step
            };
            if step.written == 0 {
                break;
            }
            pending = step.pending;
        }

        if dropped > 0 {
            tracing::warn!(
                size,
                dropped,
                "resampled audio exceeds the frame buffer; truncating"
            );
        }

        source.audio_produced = Some(source.audio_generation);
        Ok(AudioBuffer {
            channels: OUTPUT_CHANNELS,
            sample_rate: source.audio_facts.sample_rate,
            pts: source.audio_facts.presentation_ts(),
            written,
            data,
        })
    }

    /// Advance to the next video frame and convert it.
    pub fn read_video_frame(&mut self) -> Result<Step<VideoBuffer>> {
        match self.advance_video()? {
            Step::Ready(_) => Ok(Step::Ready(self.produce_video_buffer()?)),
            Step::EndOfStream => Ok(Step::EndOfStream),
        }
    }

    /// Advance to the next audio frame and resample it.
    pub fn read_audio_frame(&mut self) -> Result<Step<AudioBuffer>> {
        match self.advance_audio()? {
            Step::Ready(_) => Ok(Step::Ready(self.produce_audio_buffer()?)),
            Step::EndOfStream => Ok(Step::EndOfStream),
        }
    }
}

/// Open `path`, convert its first video frame and close it again.
pub fn load_first_frame<L: CodecLibrary>(
    library: L,
    path: impl AsRef<Path>,
) -> Result<VideoBuffer> {
    let mut reader = ReaderState::new(library);
    reader.open(path)?;
    let frame = match reader.read_video_frame()? {
        Step::Ready(frame) => frame,
        Step::EndOfStream => return Err(Error::NoDataAvailable),
    };
    reader.close();
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mr_codec::{SyntheticAudio, SyntheticFault, SyntheticLibrary, SyntheticSource};
    use mr_core::SampleFormat;

    const PATH: &str = "/media/clip.mkv";

    fn library(source: SyntheticSource) -> SyntheticLibrary {
        SyntheticLibrary::new().with_source(PATH, source)
    }

    fn open(source: SyntheticSource) -> ReaderState<SyntheticLibrary> {
        let mut reader = ReaderState::new(library(source));
        reader.open(PATH).unwrap();
        reader
    }

    #[test]
    fn video_buffer_is_tightly_packed() {
        let mut reader = open(SyntheticSource::clip(1, 30));
        let frame = reader.read_video_frame().unwrap().ready().unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert_eq!(frame.data.len(), 320 * 240 * 4);
        assert_eq!(frame.pts, Some(0));

        let frame = reader.read_video_frame().unwrap().ready().unwrap();
        assert_eq!(frame.data[0], 1);
        assert_eq!(frame.pts, Some(512));
    }

    #[test]
    fn video_buffer_needs_a_new_frame() {
        let mut reader = open(SyntheticSource::clip(1, 30));
        assert_matches!(reader.produce_video_buffer(), Err(Error::NoDataAvailable));
        reader.advance_video().unwrap();
        reader.produce_video_buffer().unwrap();
        assert_matches!(reader.produce_video_buffer(), Err(Error::NoDataAvailable));
    }

    #[test]
    fn converter_failure() {
        let mut reader =
            open(SyntheticSource::clip(1, 30).with_fault(SyntheticFault::ConverterUnavailable));
        assert_matches!(reader.read_video_frame(), Err(Error::Converter(_)));
    }

    #[test]
    fn video_buffer_without_video() {
        let mut reader = open(SyntheticSource::clip(1, 30).without_video());
        assert_matches!(reader.produce_video_buffer(), Err(Error::NoVideoStream));
    }

    #[test]
    fn audio_buffer_size_and_repeat() {
        let mut reader = open(SyntheticSource::clip(1, 30));
        assert_matches!(reader.produce_audio_buffer(), Err(Error::NoDataAvailable));

        let buffer = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.data.len(), 2 * 1024 * 4);
        assert_eq!(buffer.written, buffer.data.len());
        assert_eq!(buffer.sample_rate, Some(48_000));

        assert_matches!(reader.produce_audio_buffer(), Err(Error::NoDataAvailable));

        let next = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(next.data.len(), buffer.data.len());
    }

    #[test]
    fn audio_buffer_drains_chunked_resampler() {
        let audio = SyntheticAudio {
            resampler_chunk: Some(100),
            ..SyntheticAudio::default()
        };
        let mut reader = open(SyntheticSource::clip(1, 30).with_audio(audio));
        let buffer = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(buffer.written, 2 * 1024 * 4);
    }

    #[test]
    fn audio_buffer_truncates_overflow() {
        // Mono s16 sizes the buffer at 1024 * 2 bytes, smaller than stereo f32.
        let audio = SyntheticAudio {
            channels: 1,
            sample_format: SampleFormat::S16p,
            ..SyntheticAudio::default()
        };
        let mut reader = open(SyntheticSource::clip(1, 30).with_audio(audio));
        let buffer = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(buffer.data.len(), 1024 * 2);
        assert_eq!(buffer.written, 1024 * 2);
    }

    #[test]
    fn audio_buffer_sizing_follows_first_shape() {
        let audio = SyntheticAudio {
            first_frame_samples: Some(512),
            ..SyntheticAudio::default()
        };
        let mut reader = open(SyntheticSource::clip(1, 30).with_audio(audio));
        let first = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(first.data.len(), 2 * 512 * 4);
        // Sample counts only grow.
        let second = reader.read_audio_frame().unwrap().ready().unwrap();
        assert_eq!(second.data.len(), 2 * 1024 * 4);
    }

    #[test]
    fn resampler_failures() {
        let mut reader =
            open(SyntheticSource::clip(1, 30).with_fault(SyntheticFault::ResamplerUnavailable));
        assert_matches!(reader.read_audio_frame(), Err(Error::ResamplerUnavailable(_)));

        let mut reader =
            open(SyntheticSource::clip(1, 30).with_fault(SyntheticFault::ResampleFails));
        assert_matches!(reader.read_audio_frame(), Err(Error::ResampleFailed(_)));
    }

    #[test]
    fn video_frame_after_audio_advance_is_not_available() {
        let mut reader = open(SyntheticSource::clip(1, 30));
        reader.advance_video().unwrap();
        reader.advance_audio().unwrap();
        // The frame slot now holds audio.
        assert_matches!(reader.produce_video_buffer(), Err(Error::NoDataAvailable));
        reader.produce_audio_buffer().unwrap();
    }

    #[test]
    fn first_frame_loader() {
        let frame = load_first_frame(library(SyntheticSource::clip(1, 30)), PATH).unwrap();
        assert_eq!(frame.data.len(), 320 * 240 * 4);
        assert_eq!(frame.pts, Some(0));

        let err =
            load_first_frame(library(SyntheticSource::clip(1, 30)), "/missing.mkv").unwrap_err();
        assert_matches!(err, Error::OpenFailed { .. });
    }
}
