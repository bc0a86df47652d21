//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which registers synthetic sources under fixed
//! paths and opens readers over them.

#![allow(dead_code)]

use mediareader::{ReaderConfig, ReaderState, SyntheticLibrary, SyntheticSource};

/// 10 s, 30 fps, 320x240 video with 48 kHz stereo audio.
pub const CLIP: &str = "/media/clip-10s.mkv";
/// Same clip without an audio stream.
pub const VIDEO_ONLY: &str = "/media/video-only.mkv";
/// Same clip without a video stream.
pub const AUDIO_ONLY: &str = "/media/audio-only.m4a";

/// Timebase units per frame of [`CLIP`].
pub const FRAME_INTERVAL: i64 = 512;

pub struct TestHarness {
    pub library: SyntheticLibrary,
    pub config: ReaderConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        let library = SyntheticLibrary::new()
            .with_source(CLIP, SyntheticSource::clip(10, 30))
            .with_source(VIDEO_ONLY, SyntheticSource::clip(10, 30).without_audio())
            .with_source(AUDIO_ONLY, SyntheticSource::clip(10, 30).without_video());
        Self { library, config }
    }

    /// Register an extra source.
    pub fn with_source(mut self, path: &str, source: SyntheticSource) -> Self {
        self.library.insert(path, source);
        self
    }

    /// A closed reader over this harness's sources.
    pub fn reader(&self) -> ReaderState<SyntheticLibrary> {
        ReaderState::with_config(self.library.clone(), self.config.clone())
    }

    /// A reader opened on `path`.
    pub fn open(&self, path: &str) -> ReaderState<SyntheticLibrary> {
        let mut reader = self.reader();
        reader.open(path).expect("failed to open synthetic source");
        reader
    }
}
