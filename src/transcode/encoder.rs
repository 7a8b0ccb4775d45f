//! AAC/MP3 encoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` to encode planar float PCM frames into
//! AAC-LC or MP3 packets.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::format::sample::Sample;

use crate::config::OutputCodec;
use crate::error::{FfmpegError, Result, TranscodeError};
use crate::ffmpeg_utils::helpers;

use super::codec::{AudioEncoder, Step};
use super::sample::{SampleBlock, StreamDescriptor};

/// Sample format the encoder is opened with when the codec supports it.
/// Both the native AAC encoder and libmp3lame do.
pub const PREFERRED_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
/// Frame size assumed for encoders that report a variable frame size
pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Settings an encoder is opened with
#[derive(Debug, Clone, Copy)]
pub struct EncoderSettings {
    pub codec: OutputCodec,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u64,
    /// The container stores codec headers globally (MP4, Matroska, …)
    pub global_header: bool,
}

/// Audio encoder backed by a real FFmpeg codec context
pub struct CodecEncoder {
    encoder: ffmpeg::encoder::Audio,
    descriptor: StreamDescriptor,
    frame_size: usize,
    time_base: ffmpeg::Rational,
}

impl CodecEncoder {
    /// Open an encoder with the given settings.
    pub fn open(settings: &EncoderSettings) -> Result<Self> {
        let codec_id = settings.codec.codec_id();
        let codec = codec::encoder::find(codec_id).ok_or_else(|| {
            FfmpegError::EncoderNotFound(format!(
                "{:?} encoder not found in this FFmpeg build",
                codec_id
            ))
        })?;

        let sample_format = match codec.audio() {
            Ok(audio) => audio
                .formats()
                .map(choose_sample_format)
                .unwrap_or(PREFERRED_SAMPLE_FMT),
            Err(e) => {
                return Err(FfmpegError::EncoderConfigure(format!(
                    "{:?} is not an audio encoder: {}",
                    codec_id, e
                ))
                .into())
            }
        };
        let ch_layout = helpers::default_channel_layout(settings.channels);
        let time_base = ffmpeg::Rational::new(1, settings.sample_rate as i32);

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(time_base);

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderConfigure(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(settings.sample_rate as i32);
        audio_enc.set_format(sample_format);
        audio_enc.set_channel_layout(ch_layout);
        audio_enc.set_bit_rate(settings.bit_rate as usize);
        if settings.global_header {
            audio_enc.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            FfmpegError::EncoderConfigure(format!(
                "Could not open {:?} encoder: {}",
                codec_id, e
            ))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => DEFAULT_FRAME_SIZE,
            n => n,
        };

        tracing::info!(
            codec = ?codec_id,
            sample_rate = settings.sample_rate,
            sample_format = ?sample_format,
            channels = settings.channels,
            bit_rate = settings.bit_rate,
            frame_size,
            "encoder opened"
        );

        Ok(Self {
            encoder,
            descriptor: StreamDescriptor {
                format: sample_format,
                channel_layout: ch_layout,
                channels: settings.channels,
                sample_rate: settings.sample_rate,
                frame_size: Some(frame_size),
            },
            frame_size,
            time_base,
        })
    }

    /// The encoder timebase (1 / sample_rate); packet timestamps use it.
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Codec parameters for the encoded stream (for muxer stream setup).
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        helpers::encoder_codec_parameters(&self.encoder)
    }

    /// Copy a block of samples into a freshly allocated FFmpeg frame.
    fn to_frame(&self, block: &SampleBlock) -> Result<ffmpeg::util::frame::Audio> {
        let mut frame = ffmpeg::util::frame::Audio::new(
            self.descriptor.format,
            block.samples(),
            self.descriptor.channel_layout,
        );
        frame.set_rate(self.descriptor.sample_rate);
        frame.set_pts(block.pts());

        for (index, src) in block.planes().enumerate() {
            let dst = helpers::audio_plane_data_mut(&mut frame, index);
            if dst.len() < src.len() {
                return Err(TranscodeError::Integrity(format!(
                    "encoder frame plane {} holds {} bytes, block has {}",
                    index,
                    dst.len(),
                    src.len()
                )));
            }
            dst[..src.len()].copy_from_slice(src);
        }
        Ok(frame)
    }
}

impl AudioEncoder for CodecEncoder {
    type Packet = ffmpeg::codec::packet::Packet;

    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn send_frame(&mut self, frame: Option<&SampleBlock>) -> Result<()> {
        let sent = match frame {
            Some(block) => {
                let frame = self.to_frame(block)?;
                self.encoder.send_frame(&frame)
            }
            None => self.encoder.send_eof(),
        };
        match sent {
            Ok(()) => Ok(()),
            // Already flushing; the packets are still drained below.
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::EncodeFrame(format!(
                "Could not send frame for encoding: {}",
                e
            ))
            .into()),
        }
    }

    fn receive_packet(&mut self) -> Result<Step<Self::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Step::Ready(packet)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Step::NeedMoreInput)
            }
            Err(ffmpeg::Error::Eof) => Ok(Step::EndOfStream),
            Err(e) => Err(FfmpegError::EncodeFrame(format!("Could not encode frame: {}", e)).into()),
        }
    }
}

/// Pick the encoder input format from the formats a codec lists: planar
/// float if it is among them, else the codec's first (preferred) format.
pub fn choose_sample_format(supported: impl IntoIterator<Item = Sample>) -> Sample {
    let mut first = None;
    for format in supported {
        if format == PREFERRED_SAMPLE_FMT {
            return format;
        }
        first.get_or_insert(format);
    }
    first.unwrap_or(PREFERRED_SAMPLE_FMT)
}

/// Check whether the FFmpeg build includes an encoder for `codec`.
pub fn is_encoder_available(codec: OutputCodec) -> bool {
    codec::encoder::find(codec.codec_id()).is_some()
}
