//! Container writer for the encoded audio stream

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, Result, TranscodeError};
use crate::ffmpeg_utils::helpers;

use super::codec::PacketSink;
use super::encoder::CodecEncoder;

/// Muxer writing a single audio stream to a file. The container format is
/// guessed from the file extension.
pub struct FileMuxer {
    output: ffmpeg::format::context::Output,
    stream_index: Option<usize>,
    encoder_time_base: ffmpeg::Rational,
}

impl FileMuxer {
    /// Create the output file.
    pub fn create(path: &Path) -> Result<Self> {
        if !helpers::output_format_known(path) {
            return Err(TranscodeError::UnsupportedInput(format!(
                "Could not find output file format for {:?}",
                path
            )));
        }

        let output = ffmpeg::format::output(&path).map_err(|e| {
            FfmpegError::OpenOutput(format!("Could not open output file {:?}: {}", path, e))
        })?;

        tracing::debug!(
            path = %path.display(),
            format = output.format().name(),
            "output opened"
        );

        Ok(Self {
            output,
            stream_index: None,
            encoder_time_base: ffmpeg::Rational::new(1, 1),
        })
    }

    /// Whether encoders must put their headers in extradata instead of in
    /// every packet (MP4, Matroska, …).
    pub fn requires_global_header(&self) -> bool {
        self.output
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER)
    }

    /// Add the audio stream produced by `encoder`.
    pub fn add_audio_stream(&mut self, encoder: &CodecEncoder) -> Result<usize> {
        let mut out_stream = self
            .output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| FfmpegError::StreamConfig(format!("Could not create new stream: {}", e)))?;

        out_stream.set_parameters(encoder.codec_parameters());
        // Let the muxer pick the tag the container expects
        helpers::stream_reset_codec_tag(&mut out_stream);
        // Audio timebase = 1 / sample rate; the muxer may still change it in
        // write_header, packets are rescaled on write.
        out_stream.set_time_base(encoder.time_base());

        let index = out_stream.index();
        self.stream_index = Some(index);
        self.encoder_time_base = encoder.time_base();

        tracing::debug!(stream_index = index, "added audio stream");
        Ok(index)
    }

    fn stream_index(&self) -> Result<usize> {
        self.stream_index.ok_or_else(|| {
            FfmpegError::StreamConfig("no audio stream added to the output".into()).into()
        })
    }
}

impl PacketSink<ffmpeg::codec::packet::Packet> for FileMuxer {
    fn write_header(&mut self) -> Result<()> {
        self.stream_index()?;
        self.output.write_header().map_err(|e| match e {
            // Raised by muxers that cannot store the encoded codec
            ffmpeg::Error::Other { errno } if errno == ffmpeg::error::EINVAL => {
                TranscodeError::UnsupportedInput(format!(
                    "{} container cannot carry the audio stream: {}",
                    self.output.format().name(),
                    e
                ))
            }
            e => FfmpegError::WriteHeader(format!("Could not write output file header: {}", e))
                .into(),
        })
    }

    fn write_packet(&mut self, mut packet: ffmpeg::codec::packet::Packet) -> Result<()> {
        let index = self.stream_index()?;
        let stream_time_base = self
            .output
            .stream(index)
            .map(|s| s.time_base())
            .unwrap_or(self.encoder_time_base);

        packet.set_stream(index);
        packet.set_position(-1);
        packet.rescale_ts(self.encoder_time_base, stream_time_base);

        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| FfmpegError::WritePacket(format!("Could not write frame: {}", e)).into())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.output.write_trailer().map_err(|e| {
            FfmpegError::WriteTrailer(format!("Could not write output file trailer: {}", e)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_rejected() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = FileMuxer::create(&dir.path().join("out.notaformat"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedInput);
    }

    #[test]
    fn test_mp4_requires_global_header() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let muxer = FileMuxer::create(&dir.path().join("out.m4a")).unwrap();
        assert!(muxer.requires_global_header());
    }

    #[test]
    fn test_header_needs_stream() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = FileMuxer::create(&dir.path().join("out.m4a")).unwrap();
        assert!(muxer.write_header().is_err());
    }
}
