//! Packet reading and per-stream frame advancing.
//!
//! Every packet read updates the packet-level video facts before it is routed.
//! Advancing a stream reads packets, discarding those of other streams, until
//! its decoder produces a frame. Frames still pending in the decoder are
//! received before another packet is submitted. "Not ready" from the decoder
//! is retried in place; end of stream is surfaced once per exhausted read.

use mr_codec::{
    CodecLibrary, Container, DecodeStatus, Decoder, FrameInfo, PacketInfo, ReadStatus,
};
use mr_core::{Error, MediaKind, Result};

use crate::state::{OpenSource, ReaderState, StreamSlot};

fn pick<'a, D>(
    kind: MediaKind,
    video: &'a mut Option<StreamSlot<D>>,
    audio: &'a mut Option<StreamSlot<D>>,
) -> Option<&'a mut StreamSlot<D>> {
    match kind {
        MediaKind::Video => video.as_mut(),
        MediaKind::Audio => audio.as_mut(),
        _ => None,
    }
}

/// Result of a read or advance: a value, or the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    Ready(T),
    EndOfStream,
}

impl<T> Step<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Step::EndOfStream)
    }

    /// The value, or `None` at end of stream.
    pub fn ready(self) -> Option<T> {
        match self {
            Step::Ready(value) => Some(value),
            Step::EndOfStream => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Ready(value) => Step::Ready(f(value)),
            Step::EndOfStream => Step::EndOfStream,
        }
    }
}

/// Timestamps of a raw packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStamp {
    pub stream: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub size: usize,
}

impl<L: CodecLibrary> OpenSource<L> {
    fn read_into_slot(&mut self) -> Result<Step<PacketStamp>> {
        match self.container.read_packet(&mut self.packet)? {
            ReadStatus::EndOfStream => Ok(Step::EndOfStream),
            ReadStatus::Packet => {
                let packet = &self.packet;
                self.video_facts.record_packet(packet.pts(), packet.dts());
                tracing::trace!(
                    stream = packet.stream_index(),
                    pts = ?packet.pts(),
                    dts = ?packet.dts(),
                    size = packet.size(),
                    "read packet"
                );
                Ok(Step::Ready(PacketStamp {
                    stream: packet.stream_index(),
                    pts: packet.pts(),
                    dts: packet.dts(),
                    size: packet.size(),
                }))
            }
        }
    }

    /// Decode the next frame of `kind`, returning its presentation timestamp.
    pub(crate) fn advance(&mut self, kind: MediaKind, drain: bool) -> Result<Step<Option<i64>>> {
        let missing = || match kind {
            MediaKind::Video => Error::NoVideoStream,
            _ => Error::NoAudioStream,
        };
        let index = self.slot(kind).ok_or_else(missing)?.index();

        loop {
            // Frames left over from an earlier packet come out before new input
            // goes in; decoders refuse packets while output is pending.
            let Self {
                video,
                audio,
                frame,
                ..
            } = &mut *self;
            let slot = pick(kind, video, audio).ok_or_else(missing)?;

            match slot.decoder.receive(frame)? {
                DecodeStatus::Frame => break,
                DecodeStatus::NotReady if !slot.draining => {}
                DecodeStatus::NotReady | DecodeStatus::EndOfStream => {
                    tracing::debug!(stream = index, "end of stream");
                    slot.decoder.flush();
                    slot.draining = false;
                    return Ok(Step::EndOfStream);
                }
            }

            match self.read_into_slot()? {
                Step::Ready(stamp) if stamp.stream != index => {
                    self.packet.clear();
                }
                Step::Ready(_) => {
                    let Self {
                        video,
                        audio,
                        packet,
                        ..
                    } = &mut *self;
                    let slot = pick(kind, video, audio).ok_or_else(missing)?;
                    slot.decoder.submit(packet)?;
                    packet.clear();
                }
                Step::EndOfStream if !drain => return Ok(Step::EndOfStream),
                Step::EndOfStream => {
                    let slot = self.slot_mut(kind).ok_or_else(missing)?;
                    tracing::debug!(stream = index, "container exhausted, draining decoder");
                    slot.decoder.submit_end_of_stream()?;
                    slot.draining = true;
                }
            }
        }

        self.last_advanced = Some(kind);
        let pts = match kind {
            MediaKind::Video => self.record_video_frame(),
            _ => self.record_audio_frame(),
        };
        Ok(Step::Ready(pts))
    }

    fn slot_mut(&mut self, kind: MediaKind) -> Option<&mut StreamSlot<L::Decoder>> {
        pick(kind, &mut self.video, &mut self.audio)
    }

    fn record_video_frame(&mut self) -> Option<i64> {
        let observation = self.frame.video_observation();
        self.video_facts.record_frame(&observation);
        let pts = self.video_facts.presentation_ts();
        tracing::trace!(
            frame = ?observation.frame_number,
            pts = ?pts,
            key = observation.key_frame,
            "decoded video frame"
        );
        pts
    }

    fn record_audio_frame(&mut self) -> Option<i64> {
        let observation = self.frame.audio_observation();
        self.audio_facts.record_frame(&observation);
        self.audio_generation += 1;

        if let Some(slot) = &self.audio {
            self.audio_facts.record_bit_rate(slot.decoder.bit_rate());

            let time_base = slot.timing().time_base;
            if let (Some(samples), Some(rate)) = (observation.samples, observation.sample_rate) {
                if time_base.is_valid() && time_base.num > 0 {
                    let units = i64::from(samples) * i64::from(time_base.den)
                        / (i64::from(time_base.num) * i64::from(rate));
                    self.measured_audio_interval = Some(units.max(1));
                }
            }
        }

        let pts = self.audio_facts.presentation_ts();
        tracing::trace!(
            samples = ?observation.samples,
            pts = ?pts,
            "decoded audio frame"
        );
        pts
    }
}

impl<L: CodecLibrary> ReaderState<L> {
    /// Read the next packet of any stream.
    ///
    /// The packet-level video facts are updated regardless of which stream
    /// the packet belongs to. The packet is not decoded.
    pub fn read_packet(&mut self) -> Result<Step<PacketStamp>> {
        let source = self.source_mut()?;
        let step = source.read_into_slot()?;
        source.packet.clear();
        Ok(step)
    }

    /// Decode the next video frame into the frame slot.
    ///
    /// Returns the frame's presentation timestamp when it carries one.
    pub fn advance_video(&mut self) -> Result<Step<Option<i64>>> {
        let drain = self.config.drain_at_end_of_stream;
        self.source_mut()?.advance(MediaKind::Video, drain)
    }

    /// Decode the next audio frame into the frame slot.
    pub fn advance_audio(&mut self) -> Result<Step<Option<i64>>> {
        let drain = self.config.drain_at_end_of_stream;
        self.source_mut()?.advance(MediaKind::Audio, drain)
    }
}
