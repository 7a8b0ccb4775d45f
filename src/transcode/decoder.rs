//! Audio demuxer and decoder for the transcoding pipeline
//!
//! Wraps an FFmpeg input context and `AVCodecContext` to decode the single
//! compressed audio stream of a file (AAC, MP3, FLAC, PCM, …) into raw PCM
//! `AVFrame`s.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result, TranscodeError};
use crate::ffmpeg_utils::helpers;

use super::codec::{AudioSource, DecodedAudio, Step};
use super::sample::StreamDescriptor;

impl DecodedAudio for ffmpeg::util::frame::Audio {
    fn samples(&self) -> usize {
        ffmpeg::util::frame::Audio::samples(self)
    }
}

/// Audio decoder backed by a FFmpeg codec context
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
}

impl AudioDecoder {
    /// Open a decoder for the given stream.
    ///
    /// Uses the stream's own codec parameters to initialise the context so no
    /// external configuration is needed.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let codec_id = stream.parameters().id();
        if ffmpeg::codec::decoder::find(codec_id).is_none() {
            return Err(FfmpegError::DecoderNotFound(format!("{:?}", codec_id)).into());
        }

        let mut context =
            ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
                FfmpegError::DecoderNotFound(format!(
                    "Failed to create codec context for stream {}: {}",
                    stream_index, e
                ))
            })?;
        helpers::codec_context_set_packet_time_base(&mut context, stream.time_base());

        let decoder = context.decoder().audio().map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "Failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        Ok(Self {
            decoder,
            stream_index,
        })
    }

    /// Send a compressed packet to the decoder.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        self.decoder.send_packet(packet).map_err(|e| {
            FfmpegError::DecodePacket(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))
            .into()
        })
    }

    /// Send EOF so the decoder releases its delayed frames.
    ///
    /// EOF responses are ignored: the decoder is already draining.
    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Receive one decoded PCM frame.
    pub fn receive_frame(&mut self) -> Result<Step<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Step::Ready(frame)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Step::NeedMoreInput)
            }
            Err(ffmpeg::Error::Eof) => Ok(Step::EndOfStream),
            Err(e) => Err(FfmpegError::DecodePacket(format!(
                "receive_frame error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// The source stream index.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Parameters of decoded frames.
    pub fn descriptor(&self) -> StreamDescriptor {
        let channels = self.decoder.channels();
        StreamDescriptor {
            format: self.decoder.format(),
            channel_layout: helpers::resolve_channel_layout(
                self.decoder.channel_layout(),
                channels,
            ),
            channels,
            sample_rate: self.decoder.rate(),
            frame_size: None,
        }
    }
}

/// The decoding side of the pipeline: an input file with exactly one audio
/// stream and the decoder for it.
pub struct FileSource {
    // Fields drop in declaration order: decoder before the input it reads.
    decoder: AudioDecoder,
    input: ffmpeg::format::context::Input,
    descriptor: StreamDescriptor,
    draining: bool,
}

impl FileSource {
    /// Open `path` and the decoder for its only stream.
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(&path).map_err(|e| {
            FfmpegError::OpenInput(format!("Could not open input file {:?}: {}", path, e))
        })?;

        let stream_count = input.streams().count();
        if stream_count != 1 {
            return Err(FfmpegError::StreamCount(stream_count).into());
        }
        let stream = input
            .stream(0)
            .ok_or(TranscodeError::Ffmpeg(FfmpegError::StreamCount(0)))?;
        if stream.parameters().medium() != ffmpeg::media::Type::Audio {
            return Err(TranscodeError::UnsupportedInput(format!(
                "input stream is {:?}, not audio",
                stream.parameters().medium()
            )));
        }

        let decoder = AudioDecoder::open(&stream)?;
        let descriptor = decoder.descriptor();

        tracing::info!(
            path = %path.display(),
            codec = ?stream.parameters().id(),
            sample_rate = descriptor.sample_rate,
            channels = descriptor.channels,
            format = ?descriptor.format,
            "input opened"
        );

        Ok(Self {
            decoder,
            input,
            descriptor,
            draining: false,
        })
    }

    /// Read the next packet of our stream into the decoder, or start
    /// draining the decoder once the demuxer is exhausted.
    fn feed_decoder(&mut self) -> Result<()> {
        loop {
            let mut packet = ffmpeg::codec::packet::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.decoder.stream_index() {
                        continue;
                    }
                    return self.decoder.send_packet(&packet);
                }
                Err(ffmpeg::Error::Eof) => {
                    tracing::debug!("input exhausted, draining decoder");
                    self.draining = true;
                    return self.decoder.send_eof();
                }
                Err(e) => {
                    return Err(FfmpegError::ReadPacket(format!("Could not read frame: {}", e)).into())
                }
            }
        }
    }
}

impl AudioSource for FileSource {
    type Frame = ffmpeg::util::frame::Audio;

    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn decode_frame(&mut self) -> Result<Step<Self::Frame>> {
        // Decoders may hold more than one frame per packet; hand those out
        // before reading further.
        match self.decoder.receive_frame()? {
            Step::NeedMoreInput => {}
            other => return Ok(other),
        }
        if self.draining {
            // A draining decoder never asks for input again; treat it as done.
            return Ok(Step::EndOfStream);
        }

        self.feed_decoder()?;
        self.decoder.receive_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_decoders_available() {
        for id in [
            ffmpeg::codec::Id::AAC,
            ffmpeg::codec::Id::MP3,
            ffmpeg::codec::Id::PCM_S16LE,
        ] {
            assert!(ffmpeg::codec::decoder::find(id).is_some(), "{:?}", id);
        }
    }

    #[test]
    fn test_decode_until_end_of_stream() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("tone.wav");
        let m4a = dir.path().join("tone.m4a");
        let samples = 48_000 + 100;
        crate::tests::fixtures::write_wav(&wav, 48_000, 1, samples);
        crate::transcode_file(&wav, &m4a, &crate::TranscodeConfig::default()).unwrap();

        let mut source = FileSource::open(&m4a).unwrap();
        assert_eq!(source.descriptor().sample_rate, 48_000);

        let mut decoded = 0;
        let mut steps = 0;
        loop {
            match source.decode_frame().unwrap() {
                Step::Ready(frame) => decoded += frame.samples(),
                Step::NeedMoreInput => {}
                Step::EndOfStream => break,
            }
            steps += 1;
            assert!(steps < 10_000, "source never reached end of stream");
        }

        assert!(source.draining);
        assert!(decoded >= samples, "decoded {} of {}", decoded, samples);
        // end of stream is sticky
        assert!(matches!(source.decode_frame().unwrap(), Step::EndOfStream));
        assert!(matches!(source.decode_frame().unwrap(), Step::EndOfStream));
    }

    #[test]
    fn test_open_missing_file() {
        crate::ffmpeg_utils::init().unwrap();
        let err = FileSource::open(Path::new("/nonexistent/input.wav"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::IoFailure);
    }
}
