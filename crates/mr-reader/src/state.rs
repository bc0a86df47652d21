//! The per-source reader state and its open/close lifecycle.

use std::path::{Path, PathBuf};

use mr_codec::{CodecLibrary, Container, Decoder, StreamInfo};
use mr_core::{
    AudioFrameFacts, Error, MediaKind, ReaderConfig, Result, SampleFormat, StreamTiming,
    VideoFrameFacts,
};

/// One decodable stream: its description, timing and decoder.
pub(crate) struct StreamSlot<D> {
    pub(crate) info: StreamInfo,
    pub(crate) decoder: D,
    /// End of input was signalled and buffered frames are being drained.
    pub(crate) draining: bool,
}

impl<D: Decoder> StreamSlot<D> {
    pub(crate) fn index(&self) -> usize {
        self.info.index
    }

    pub(crate) fn timing(&self) -> &StreamTiming {
        &self.info.timing
    }
}

/// Everything owned while a source is open.
///
/// Fields drop in declaration order, which releases the container first,
/// then both decoders, the converter, the resampler and finally the
/// packet and frame slots.
pub(crate) struct OpenSource<L: CodecLibrary> {
    pub(crate) container: L::Container,
    pub(crate) video: Option<StreamSlot<L::Decoder>>,
    pub(crate) audio: Option<StreamSlot<L::Decoder>>,
    pub(crate) converter: Option<L::Converter>,
    pub(crate) resampler: Option<L::Resampler>,
    pub(crate) packet: L::Packet,
    pub(crate) frame: L::Frame,

    pub(crate) path: PathBuf,
    pub(crate) video_facts: VideoFrameFacts,
    pub(crate) audio_facts: AudioFrameFacts,
    /// Audio frame interval measured from decoded frames.
    pub(crate) measured_audio_interval: Option<i64>,
    /// Bumped on every decoded audio frame.
    pub(crate) audio_generation: u64,
    /// Generation the last audio buffer was produced from.
    pub(crate) audio_produced: Option<u64>,
    pub(crate) last_advanced: Option<MediaKind>,
}

impl<L: CodecLibrary> OpenSource<L> {
    pub(crate) fn slot(&self, kind: MediaKind) -> Option<&StreamSlot<L::Decoder>> {
        match kind {
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
            _ => None,
        }
    }
}

/// A stateful reader over one source at a time.
///
/// The reader is created closed. [`open`](Self::open) binds it to a source,
/// [`close`](Self::close) releases everything, after which it can be opened
/// again. A `ReaderState` is not meant to be shared between threads; separate
/// readers are fully independent.
pub struct ReaderState<L: CodecLibrary> {
    pub(crate) library: L,
    pub(crate) config: ReaderConfig,
    pub(crate) source: Option<OpenSource<L>>,
}

impl<L: CodecLibrary> ReaderState<L> {
    /// Create a closed reader with default configuration.
    pub fn new(library: L) -> Self {
        Self::with_config(library, ReaderConfig::default())
    }

    /// Create a closed reader with the given configuration.
    pub fn with_config(library: L, config: ReaderConfig) -> Self {
        for warning in config.validate() {
            tracing::warn!("{warning}");
        }
        Self {
            library,
            config,
            source: None,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    /// Open `path`, selecting the first decodable video and audio streams.
    ///
    /// Streams whose codec the library cannot decode are skipped. Fails with
    /// [`Error::AlreadyOpen`] if a source is already open.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(source) = &self.source {
            return Err(Error::AlreadyOpen {
                path: source.path.clone(),
            });
        }

        let container = self.library.open_container(path)?;
        let streams = container.streams().to_vec();
        if streams.is_empty() {
            return Err(Error::NoStreams {
                path: path.to_path_buf(),
            });
        }

        let video = self.open_stream(&container, &streams, MediaKind::Video)?;
        let audio = self.open_stream(&container, &streams, MediaKind::Audio)?;
        if video.is_none() && audio.is_none() {
            return Err(Error::NoDecodableStream {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            library = self.library.name(),
            video = ?video.as_ref().map(StreamSlot::index),
            audio = ?audio.as_ref().map(StreamSlot::index),
            "opened source"
        );

        self.source = Some(OpenSource {
            container,
            video,
            audio,
            converter: None,
            resampler: None,
            packet: L::Packet::default(),
            frame: L::Frame::default(),
            path: path.to_path_buf(),
            video_facts: VideoFrameFacts::default(),
            audio_facts: AudioFrameFacts::default(),
            measured_audio_interval: None,
            audio_generation: 0,
            audio_produced: None,
            last_advanced: None,
        });
        Ok(())
    }

    fn open_stream(
        &self,
        container: &L::Container,
        streams: &[StreamInfo],
        kind: MediaKind,
    ) -> Result<Option<StreamSlot<L::Decoder>>> {
        for stream in streams.iter().filter(|s| s.kind == kind) {
            let decoder =
                match self
                    .library
                    .open_decoder(container, stream, self.config.decoder_threads)
                {
                    Ok(decoder) => decoder,
                    Err(e @ Error::CodecNotFound { .. }) => {
                        tracing::warn!(
                            stream = stream.index,
                            codec = %stream.codec,
                            "skipping stream: {e}"
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            let timing = &stream.timing;
            if !timing.time_base.is_valid() {
                tracing::warn!(
                    stream = stream.index,
                    time_base = %timing.time_base,
                    "invalid timebase"
                );
            }
            if kind == MediaKind::Video && !timing.avg_frame_rate.is_valid() {
                tracing::warn!(
                    stream = stream.index,
                    frame_rate = %timing.avg_frame_rate,
                    "invalid frame rate, frame interval defaults to 1"
                );
            }

            return Ok(Some(StreamSlot {
                info: stream.clone(),
                decoder,
                draining: false,
            }));
        }
        Ok(None)
    }

    /// Release the source and every handle bound to it. Closing a closed
    /// reader does nothing.
    pub fn close(&mut self) {
        if let Some(source) = self.source.take() {
            tracing::debug!(path = %source.path.display(), "closing source");
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.video.is_some())
    }

    pub fn has_audio(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.audio.is_some())
    }

    /// Path of the open source.
    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path.as_path())
    }

    pub(crate) fn source(&self) -> Result<&OpenSource<L>> {
        self.source.as_ref().ok_or(Error::NotOpen)
    }

    pub(crate) fn source_mut(&mut self) -> Result<&mut OpenSource<L>> {
        self.source.as_mut().ok_or(Error::NotOpen)
    }

    fn video_slot(&self) -> Result<&StreamSlot<L::Decoder>> {
        self.source()?.video.as_ref().ok_or(Error::NoVideoStream)
    }

    fn audio_slot(&self) -> Result<&StreamSlot<L::Decoder>> {
        self.source()?.audio.as_ref().ok_or(Error::NoAudioStream)
    }

    // -----------------------------------------------------------------------
    // Facts and timing
    // -----------------------------------------------------------------------

    pub fn video_facts(&self) -> Result<&VideoFrameFacts> {
        Ok(&self.source()?.video_facts)
    }

    pub fn audio_facts(&self) -> Result<&AudioFrameFacts> {
        Ok(&self.source()?.audio_facts)
    }

    pub fn video_timing(&self) -> Result<StreamTiming> {
        Ok(*self.video_slot()?.timing())
    }

    pub fn audio_timing(&self) -> Result<StreamTiming> {
        Ok(*self.audio_slot()?.timing())
    }

    /// Stream kind advanced most recently; the frame slot holds its frame.
    pub fn last_advanced(&self) -> Option<MediaKind> {
        self.source.as_ref().and_then(|s| s.last_advanced)
    }

    /// Rounded average video frame rate, 0 when unknown.
    pub fn fps(&self) -> Result<u32> {
        Ok(self.video_slot()?.timing().fps())
    }

    /// Video timebase units per frame; 1 when the rationals are degenerate.
    pub fn video_frame_interval(&self) -> Result<i64> {
        Ok(self.video_slot()?.timing().frame_interval().unwrap_or(1))
    }

    /// Audio timebase units per frame.
    ///
    /// Taken from the stream rationals when they are valid, otherwise from
    /// decoded frames; never below 1.
    pub fn audio_frame_interval(&self) -> Result<i64> {
        let source = self.source()?;
        let slot = source.audio.as_ref().ok_or(Error::NoAudioStream)?;
        let interval = slot
            .timing()
            .frame_interval()
            .or(source.measured_audio_interval)
            .unwrap_or(1);
        Ok(interval.max(1))
    }

    pub fn video_total_seconds(&self) -> Result<f64> {
        Ok(self.video_slot()?.timing().total_seconds())
    }

    pub fn audio_total_seconds(&self) -> Result<f64> {
        Ok(self.audio_slot()?.timing().total_seconds())
    }

    /// Declared video width in pixels.
    pub fn width(&self) -> Result<u32> {
        Ok(self.video_slot()?.info.width)
    }

    /// Declared video height in pixels.
    pub fn height(&self) -> Result<u32> {
        Ok(self.video_slot()?.info.height)
    }

    pub fn video_codec_name(&self) -> Result<&str> {
        Ok(self.video_slot()?.decoder.codec_name())
    }

    pub fn audio_codec_name(&self) -> Result<&str> {
        Ok(self.audio_slot()?.decoder.codec_name())
    }

    /// Samples per audio frame as fixed by the codec, when it fixes one.
    pub fn audio_frame_size(&self) -> Result<Option<u32>> {
        Ok(self.audio_slot()?.decoder.frame_size())
    }

    /// Width of one sample in the packed form of the decoder's native format.
    pub fn bytes_per_sample(&self) -> Result<usize> {
        Ok(self
            .audio_slot()?
            .decoder
            .sample_format()
            .map_or(0, |f| SampleFormat::packed(f).bytes_per_sample()))
    }

    /// Bytes one audio output buffer holds, or `None` before the shape is known.
    pub fn audio_buffer_size(&self) -> Result<Option<usize>> {
        let bytes = self.bytes_per_sample()?;
        Ok(self.source()?.audio_facts.buffer_size(bytes))
    }
}

impl<L: CodecLibrary> Drop for ReaderState<L> {
    fn drop(&mut self) {
        self.close();
    }
}
