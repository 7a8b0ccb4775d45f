use std::path::Path;

use crate::config::TranscodeConfig;
use crate::error::Result;
use crate::transcode::decoder::FileSource;
use crate::transcode::encoder::{CodecEncoder, EncoderSettings};
use crate::transcode::muxer::FileMuxer;
use crate::transcode::resampler::AudioResampler;
use crate::transcode::{AudioSource, AudioEncoder, Pipeline, TranscodeStats};

/// Transcode the single audio stream of `input` into `output`.
///
/// The container is guessed from the output extension; the codec comes from
/// the config (or the extension, see [`TranscodeConfig::codec_for`]). The
/// output keeps the input's sample rate. Everything opened here is released
/// when this function returns, on success and on failure alike.
pub fn transcode_file(input: &Path, output: &Path, config: &TranscodeConfig) -> Result<TranscodeStats> {
    config.validate()?;

    let source = FileSource::open(input)?;
    let mut muxer = FileMuxer::create(output)?;

    let settings = EncoderSettings {
        codec: config.codec_for(output),
        sample_rate: source.descriptor().sample_rate,
        channels: config.channels,
        bit_rate: config.bit_rate,
        global_header: muxer.requires_global_header(),
    };
    let encoder = CodecEncoder::open(&settings)?;
    muxer.add_audio_stream(&encoder)?;

    let resampler = AudioResampler::new(source.descriptor(), encoder.descriptor())?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        codec = ?settings.codec,
        frame_size = encoder.frame_size(),
        "transcoding"
    );

    let mut pipeline = Pipeline::new(source, resampler, encoder, muxer)?;
    pipeline.run()
}
