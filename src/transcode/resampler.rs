//! Sample converter for the transcoding pipeline
//!
//! Converts decoded PCM frames to the encoder's sample format and channel
//! layout via FFmpeg's `SwrContext`. The sample rate is never changed: the
//! encoder is opened at the input rate.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;

use crate::error::{FfmpegError, Result, TranscodeError};
use crate::ffmpeg_utils::helpers;

use super::codec::SampleConverter;
use super::sample::{SampleBlock, StreamDescriptor};

/// Audio converter wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
    input: StreamDescriptor,
    output: StreamDescriptor,
}

impl AudioResampler {
    /// Create a converter from the decoder's output to the encoder's input.
    ///
    /// Fails if the rates differ: a rate change would make the converted
    /// sample count differ from the input count.
    pub fn new(input: &StreamDescriptor, output: &StreamDescriptor) -> Result<Self> {
        if input.sample_rate != output.sample_rate {
            return Err(TranscodeError::UnsupportedInput(format!(
                "sample rate conversion {} Hz -> {} Hz is not supported",
                input.sample_rate, output.sample_rate
            )));
        }

        let context = resampling::Context::get(
            input.format,
            input.channel_layout,
            input.sample_rate,
            output.format,
            output.channel_layout,
            output.sample_rate,
        )
        .map_err(|e| {
            FfmpegError::ResamplerCreate(format!("Could not open resample context: {}", e))
        })?;

        tracing::debug!(
            from_format = ?input.format,
            from_channels = input.channels,
            to_format = ?output.format,
            to_channels = output.channels,
            sample_rate = output.sample_rate,
            "resampler created"
        );

        Ok(Self {
            context,
            input: *input,
            output: *output,
        })
    }

    /// The output sample rate.
    pub fn output_rate(&self) -> u32 {
        self.output.sample_rate
    }
}

impl SampleConverter<ffmpeg::util::frame::Audio> for AudioResampler {
    fn convert(
        &mut self,
        input: &ffmpeg::util::frame::Audio,
        output: &mut SampleBlock,
    ) -> Result<usize> {
        let in_count = input.samples();
        let out_count = output.samples();
        if in_count > out_count {
            return Err(TranscodeError::Integrity(format!(
                "converter output holds {} samples, frame has {}",
                out_count, in_count
            )));
        }

        // The context is fixed to the parameters it was built with; a frame
        // in any other shape would be read past its end.
        if input.format() != self.input.format
            || input.rate() != self.input.sample_rate
            || input.channels() != self.input.channels
        {
            return Err(FfmpegError::Resample(format!(
                "input changed: frame is {:?} {} Hz {} ch, resampler expects {:?} {} Hz {} ch",
                input.format(),
                input.rate(),
                input.channels(),
                self.input.format,
                self.input.sample_rate,
                self.input.channels
            ))
            .into());
        }

        let in_ptrs = helpers::audio_plane_ptrs(input);
        let expected_planes = self.input.layout().planes();
        if in_ptrs.len() != expected_planes {
            return Err(FfmpegError::Resample(format!(
                "frame has {} planes, resampler expects {}",
                in_ptrs.len(),
                expected_planes
            ))
            .into());
        }
        let mut out_ptrs: Vec<*mut u8> = (0..output.layout().planes())
            .map(|i| output.plane_mut(i).as_mut_ptr())
            .collect();

        // SAFETY: `in_ptrs` points at the planes of a live decoded frame
        // holding `in_count` samples in the format the context was built
        // for. `out_ptrs` points at `output`'s planes, each sized for
        // `out_count` samples of the output format, and `output` stays
        // borrowed mutably for the duration of the call.
        let converted = unsafe {
            ffmpeg::ffi::swr_convert(
                self.context.as_mut_ptr(),
                out_ptrs.as_mut_ptr() as _,
                out_count as i32,
                in_ptrs.as_ptr() as _,
                in_count as i32,
            )
        };
        if converted < 0 {
            return Err(FfmpegError::Resample(format!(
                "Could not convert input samples: {}",
                ffmpeg::Error::from(converted)
            ))
            .into());
        }

        Ok(converted as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::util::channel_layout::ChannelLayout;
    use ffmpeg::util::format::sample::{Sample, Type};

    fn descriptor(format: Sample, layout: ChannelLayout, channels: u16, rate: u32) -> StreamDescriptor {
        StreamDescriptor {
            format,
            channel_layout: layout,
            channels,
            sample_rate: rate,
            frame_size: None,
        }
    }

    #[test]
    fn test_rate_mismatch_rejected() {
        let input = descriptor(Sample::I16(Type::Packed), ChannelLayout::STEREO, 2, 44_100);
        let output = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 48_000);
        let err = AudioResampler::new(&input, &output).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedInput);
    }

    #[test]
    fn test_s16_mono_to_fltp_stereo() {
        crate::ffmpeg_utils::init().unwrap();
        let input = descriptor(Sample::I16(Type::Packed), ChannelLayout::MONO, 1, 48_000);
        let output = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 48_000);
        let mut resampler = AudioResampler::new(&input, &output).unwrap();
        assert_eq!(resampler.output_rate(), 48_000);

        let mut frame = ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), 480, ChannelLayout::MONO);
        frame.set_rate(48_000);
        for (i, chunk) in helpers::audio_plane_data_mut(&mut frame, 0)
            .chunks_exact_mut(2)
            .take(480)
            .enumerate()
        {
            let v: i16 = if i % 2 == 0 { 16_384 } else { -16_384 };
            chunk.copy_from_slice(&v.to_ne_bytes());
        }

        let mut block = SampleBlock::zeroed(output.layout(), 480).unwrap();
        let produced = resampler.convert(&frame, &mut block).unwrap();
        assert_eq!(produced, 480);

        let first = f32::from_ne_bytes(block.plane(0)[0..4].try_into().unwrap());
        assert!(first.abs() > 0.1, "converted sample should be non-silent: {}", first);
    }

    #[test]
    fn test_undersized_output_rejected() {
        crate::ffmpeg_utils::init().unwrap();
        let input = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 44_100);
        let output = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 44_100);
        let mut resampler = AudioResampler::new(&input, &output).unwrap();

        let mut frame = ffmpeg::util::frame::Audio::new(Sample::F32(Type::Planar), 64, ChannelLayout::STEREO);
        frame.set_rate(44_100);
        let mut block = SampleBlock::zeroed(output.layout(), 32).unwrap();
        let err = resampler.convert(&frame, &mut block).unwrap_err();
        assert!(matches!(err, TranscodeError::Integrity(_)));
    }

    #[test]
    fn test_changed_channel_count_rejected() {
        crate::ffmpeg_utils::init().unwrap();
        let input = descriptor(Sample::I16(Type::Packed), ChannelLayout::STEREO, 2, 48_000);
        let output = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 48_000);
        let mut resampler = AudioResampler::new(&input, &output).unwrap();

        // packed mono has as many planes as packed stereo, but half the bytes
        let mut frame = ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), 256, ChannelLayout::MONO);
        frame.set_rate(48_000);
        let mut block = SampleBlock::zeroed(output.layout(), 256).unwrap();
        let err = resampler.convert(&frame, &mut block).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CodecFailure);
    }

    #[test]
    fn test_changed_rate_and_format_rejected() {
        crate::ffmpeg_utils::init().unwrap();
        let input = descriptor(Sample::I16(Type::Packed), ChannelLayout::STEREO, 2, 48_000);
        let output = descriptor(Sample::F32(Type::Planar), ChannelLayout::STEREO, 2, 48_000);
        let mut resampler = AudioResampler::new(&input, &output).unwrap();
        let mut block = SampleBlock::zeroed(output.layout(), 128).unwrap();

        let mut frame = ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), 128, ChannelLayout::STEREO);
        frame.set_rate(44_100);
        assert!(matches!(
            resampler.convert(&frame, &mut block),
            Err(TranscodeError::Ffmpeg(FfmpegError::Resample(_)))
        ));

        let mut frame = ffmpeg::util::frame::Audio::new(Sample::F32(Type::Packed), 128, ChannelLayout::STEREO);
        frame.set_rate(48_000);
        assert!(matches!(
            resampler.convert(&frame, &mut block),
            Err(TranscodeError::Ffmpeg(FfmpegError::Resample(_)))
        ));
    }
}
