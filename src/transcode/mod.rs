//! Audio transcoding module
//!
//! This module handles the whole decode → convert → encode path:
//! - Audio demuxing and decoding of the single input stream
//! - Sample format/layout conversion at the input sample rate
//! - Re-chunking decoder frames into encoder-sized frames (FIFO)
//! - AAC/MP3 encoding and muxing into the output container

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod fifo;
pub mod muxer;
pub mod pipeline;
pub mod resampler;
pub mod sample;

pub use codec::{AudioEncoder, AudioSource, DecodedAudio, PacketSink, SampleConverter, Step};
pub use pipeline::{Pipeline, PipelineState, PumpOutcome, TranscodeStats};
pub use sample::{SampleBlock, SampleLayout, StreamDescriptor};
