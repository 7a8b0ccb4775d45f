//! End-to-end transcodes of generated WAV files through FFmpeg

use std::path::Path;

use ffmpeg_next as ffmpeg;

use super::fixtures::write_wav;
use crate::config::{OutputCodec, TranscodeConfig};
use crate::error::{ErrorKind, FfmpegError, TranscodeError};
use crate::transcode::encoder::{is_encoder_available, CodecEncoder, EncoderSettings};
use crate::transcode::muxer::FileMuxer;
use crate::transcode::PacketSink;
use crate::transcode_file;

/// Open `path` and return its single stream's codec, sample rate and
/// packet count.
fn probe(path: &Path) -> (ffmpeg::codec::Id, u32, usize) {
    let mut input = ffmpeg::format::input(&path).unwrap();
    assert_eq!(input.streams().count(), 1);

    let stream = input.streams().next().unwrap();
    let params = stream.parameters();
    let codec_id = params.id();
    let rate = ffmpeg::codec::context::Context::from_parameters(params)
        .unwrap()
        .decoder()
        .audio()
        .unwrap()
        .rate();

    let packets = input.packets().count();
    (codec_id, rate, packets)
}

#[test]
fn test_wav_to_m4a() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("tone.m4a");

    // one second plus a remainder that is not a multiple of 1024
    let samples = 48_000 + 500;
    write_wav(&input, 48_000, 2, samples);

    let stats = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap();
    assert_eq!(stats.decoded_samples, samples as u64);
    assert_eq!(stats.encoded_samples, samples as u64);
    assert_eq!(stats.encoded_frames, samples.div_ceil(1024) as u64);
    assert!(stats.packets_written > 0);

    let (codec_id, rate, packets) = probe(&output);
    assert_eq!(codec_id, ffmpeg::codec::Id::AAC);
    assert_eq!(rate, 48_000);
    assert!(packets > 0);
}

#[test]
fn test_mono_wav_upmixed_to_stereo() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mono.wav");
    let output = dir.path().join("mono.m4a");
    write_wav(&input, 44_100, 1, 10_000);

    let stats = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap();
    assert_eq!(stats.encoded_samples, 10_000);

    let input = ffmpeg::format::input(&output).unwrap();
    let stream = input.streams().next().unwrap();
    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .unwrap()
        .decoder()
        .audio()
        .unwrap();
    assert_eq!(decoder.channels(), 2);
    assert_eq!(decoder.rate(), 44_100);
}

#[test]
fn test_wav_to_mp3() {
    crate::ffmpeg_utils::init().unwrap();
    if !is_encoder_available(OutputCodec::Mp3) {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("tone.mp3");
    write_wav(&input, 44_100, 2, 20_000);

    let stats = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap();
    assert_eq!(stats.encoded_samples, 20_000);
    // 1152-sample MP3 frames
    assert_eq!(stats.encoded_frames, 18);

    let (codec_id, rate, packets) = probe(&output);
    assert_eq!(codec_id, ffmpeg::codec::Id::MP3);
    assert_eq!(rate, 44_100);
    assert!(packets > 0);
}

#[test]
fn test_short_input_gives_single_partial_frame() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blip.wav");
    let output = dir.path().join("blip.m4a");
    write_wav(&input, 48_000, 2, 300);

    let stats = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap();
    assert_eq!(stats.encoded_frames, 1);
    assert_eq!(stats.encoded_samples, 300);
    assert!(output.exists());
}

#[test]
fn test_missing_input() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = transcode_file(
        &dir.path().join("absent.wav"),
        &dir.path().join("out.m4a"),
        &TranscodeConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_unknown_output_extension() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    write_wav(&input, 48_000, 2, 1000);

    let output = dir.path().join("out.not-a-container");
    let err = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
    assert!(!output.exists());
}

#[test]
fn test_invalid_config_rejected_before_opening_files() {
    let config = TranscodeConfig {
        channels: 6,
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let err = transcode_file(
        &dir.path().join("absent.wav"),
        &dir.path().join("out.m4a"),
        &config,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
}

/// Write a Matroska file holding two (empty) AAC streams.
fn write_two_stream_file(path: &Path) {
    let settings = EncoderSettings {
        codec: OutputCodec::Aac,
        sample_rate: 48_000,
        channels: 2,
        bit_rate: 96_000,
        global_header: true,
    };
    let first = CodecEncoder::open(&settings).unwrap();
    let second = CodecEncoder::open(&settings).unwrap();

    let mut muxer = FileMuxer::create(path).unwrap();
    muxer.add_audio_stream(&first).unwrap();
    muxer.add_audio_stream(&second).unwrap();
    muxer.write_header().unwrap();
    muxer.write_trailer().unwrap();
}

#[test]
fn test_two_stream_input_rejected() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("two.mka");
    let output = dir.path().join("out.m4a");
    write_two_stream_file(&input);

    let err = transcode_file(&input, &output, &TranscodeConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
    assert!(matches!(
        err,
        TranscodeError::Ffmpeg(FfmpegError::StreamCount(2))
    ));
    assert!(!output.exists());
}

#[test]
fn test_compressed_input_drained_to_the_end() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    let first = dir.path().join("first.m4a");
    let second = dir.path().join("second.m4a");

    let samples = 3 * 48_000 + 777;
    write_wav(&wav, 48_000, 2, samples);
    transcode_file(&wav, &first, &TranscodeConfig::default()).unwrap();

    // AAC in, so the decoder is flushed at end of input
    let stats = transcode_file(&first, &second, &TranscodeConfig::default()).unwrap();
    assert!(
        stats.decoded_samples >= samples as u64,
        "decoded {} of {} samples",
        stats.decoded_samples,
        samples
    );
    assert_eq!(stats.encoded_samples, stats.decoded_samples);

    let (codec_id, rate, packets) = probe(&second);
    assert_eq!(codec_id, ffmpeg::codec::Id::AAC);
    assert_eq!(rate, 48_000);
    assert!(packets > 0);
}

#[test]
fn test_container_rejecting_codec() {
    crate::ffmpeg_utils::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    write_wav(&input, 44_100, 2, 4096);

    // the MP3 muxer only carries MP3
    let config = TranscodeConfig {
        codec: Some(OutputCodec::Aac),
        ..Default::default()
    };
    let err = transcode_file(&input, &dir.path().join("out.mp3"), &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
}
