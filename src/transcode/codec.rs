//! Collaborator seams of the transcoding pipeline
//!
//! The pipeline only drives these traits; the FFmpeg-backed implementations
//! live in `decoder`, `resampler`, `encoder` and `muxer`, and the tests
//! provide scripted ones.

use crate::error::Result;

use super::sample::{SampleBlock, StreamDescriptor};

/// Outcome of a pull from a decoder or encoder.
///
/// Errors travel separately in `Result`, so "no data yet" and "done" can
/// never be mistaken for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Data was produced.
    Ready(T),
    /// Nothing yet; push more input and ask again.
    NeedMoreInput,
    /// Fully drained; no further output will ever come.
    EndOfStream,
}

/// A decoded frame in the source's native sample format.
pub trait DecodedAudio {
    /// Number of samples per channel.
    fn samples(&self) -> usize;
}

/// Demuxer and decoder of a single audio stream.
pub trait AudioSource {
    type Frame: DecodedAudio;

    fn descriptor(&self) -> &StreamDescriptor;

    /// Produce one decoded frame, reading as many packets as that takes.
    ///
    /// May return `NeedMoreInput` when a packet was consumed without a frame
    /// coming out; the caller simply asks again.
    fn decode_frame(&mut self) -> Result<Step<Self::Frame>>;
}

/// Sample format/layout converter. Input and output rates are equal, so a
/// frame of N samples converts to at most N samples.
pub trait SampleConverter<F> {
    /// Convert `input` into `output`, which has room for exactly
    /// `input.samples()` samples. Returns the number of samples written.
    fn convert(&mut self, input: &F, output: &mut SampleBlock) -> Result<usize>;
}

/// Push-based encoder with a fixed frame size.
pub trait AudioEncoder {
    type Packet;

    /// Input parameters the encoder was opened with. `frame_size` is always
    /// set.
    fn descriptor(&self) -> &StreamDescriptor;

    /// Samples per channel the encoder takes per frame. Only the final frame
    /// of a stream may be shorter.
    fn frame_size(&self) -> usize;

    /// Push a frame, or `None` to request a flush of buffered output.
    fn send_frame(&mut self, frame: Option<&SampleBlock>) -> Result<()>;

    fn receive_packet(&mut self) -> Result<Step<Self::Packet>>;
}

/// Container writer for encoded packets.
pub trait PacketSink<P> {
    fn write_header(&mut self) -> Result<()>;

    fn write_packet(&mut self, packet: P) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;
}
