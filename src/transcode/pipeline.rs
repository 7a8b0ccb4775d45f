//! Audio transcoding pipeline
//!
//! Bridges a pull-based decoder and a push-based encoder whose frame sizes
//! differ:
//!
//! ```text
//! AudioSource → SampleConverter → SampleFifo → AudioEncoder → PacketSink
//! ```
//!
//! The driver alternates between filling the FIFO until one encoder frame is
//! available and draining it one encoder frame at a time. Once the source
//! reports end of stream, the remaining partial frame is encoded, the
//! encoder is flushed and the container trailer is written.

use crate::error::{Result, TranscodeError};

use super::codec::{AudioEncoder, AudioSource, DecodedAudio, PacketSink, SampleConverter, Step};
use super::fifo::SampleFifo;
use super::sample::SampleBlock;

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Pumping decoded frames until one encoder frame is buffered or the
    /// input ends.
    Filling,
    /// Encoding full frames (and the final partial frame after end of input).
    Draining,
    /// Pushing flush requests until the encoder has nothing left.
    Flushing,
    /// Writing the container trailer on entry; terminal afterwards.
    Done,
    /// A stage failed; the pipeline cannot continue.
    Failed,
}

/// Result of one read-decode-convert-store step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// This many converted samples were appended to the FIFO.
    Stored(usize),
    /// The decoder consumed input without producing a frame.
    Pending,
    /// The source is exhausted.
    Finished,
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub decoded_frames: u64,
    pub decoded_samples: u64,
    pub encoded_frames: u64,
    pub encoded_samples: u64,
    pub packets_written: u64,
    /// Packets that only came out while flushing the encoder
    pub flush_packets: u64,
    /// Number of times the driver entered `Filling`
    pub fill_cycles: u64,
}

/// The transcoding pipeline over its four collaborators.
pub struct Pipeline<S, C, E, M> {
    // Fields drop in declaration order: reverse of acquisition.
    fifo: SampleFifo,
    converter: C,
    encoder: E,
    sink: M,
    source: S,
    /// Encoder frame size, fixed once the encoder is open
    frame_size: usize,
    /// Timestamp, in samples, of the next frame handed to the encoder
    next_pts: i64,
    finished: bool,
    header_written: bool,
    state: PipelineState,
    stats: TranscodeStats,
}

impl<S, C, E, M> Pipeline<S, C, E, M>
where
    S: AudioSource,
    C: SampleConverter<S::Frame>,
    E: AudioEncoder,
    M: PacketSink<E::Packet>,
{
    /// Assemble a pipeline from opened collaborators.
    pub fn new(source: S, converter: C, encoder: E, sink: M) -> Result<Self> {
        let frame_size = encoder.frame_size();
        if frame_size == 0 {
            return Err(TranscodeError::Config(
                "encoder reports a frame size of 0".into(),
            ));
        }

        let input_rate = source.descriptor().sample_rate;
        let output_rate = encoder.descriptor().sample_rate;
        if input_rate != output_rate {
            return Err(TranscodeError::UnsupportedInput(format!(
                "encoder rate {} Hz differs from input rate {} Hz",
                output_rate, input_rate
            )));
        }

        let fifo = SampleFifo::new(encoder.descriptor().layout(), frame_size)?;

        Ok(Self {
            fifo,
            converter,
            encoder,
            sink,
            source,
            frame_size,
            next_pts: 0,
            finished: false,
            header_written: false,
            state: PipelineState::Filling,
            stats: TranscodeStats::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    /// Samples currently buffered between decoder and encoder.
    pub fn fifo_level(&self) -> usize {
        self.fifo.level()
    }

    /// Timestamp the next encoded frame will carry; equals the number of
    /// samples handed to the encoder so far.
    pub fn next_pts(&self) -> i64 {
        self.next_pts
    }

    /// Whether the source has reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Write the container header. Must precede the first `step`.
    pub fn start(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let result = self.sink.write_header();
        self.check(result)?;
        self.header_written = true;
        Ok(())
    }

    /// Run the pipeline to completion.
    pub fn run(&mut self) -> Result<TranscodeStats> {
        self.start()?;
        while self.state != PipelineState::Done {
            self.step()?;
        }

        tracing::info!(
            decoded_frames = self.stats.decoded_frames,
            decoded_samples = self.stats.decoded_samples,
            encoded_frames = self.stats.encoded_frames,
            packets = self.stats.packets_written,
            fill_cycles = self.stats.fill_cycles,
            "transcode finished"
        );
        Ok(self.stats.clone())
    }

    /// Perform the work of the current state and move to the next one.
    pub fn step(&mut self) -> Result<PipelineState> {
        if !self.header_written {
            return Err(TranscodeError::Integrity(
                "pipeline stepped before the header was written".into(),
            ));
        }

        let result = match self.state {
            PipelineState::Filling => self.fill(),
            PipelineState::Draining => self.drain_ready(),
            PipelineState::Flushing => self.flush(),
            PipelineState::Done => return Ok(PipelineState::Done),
            PipelineState::Failed => {
                return Err(TranscodeError::Integrity(
                    "pipeline already failed".into(),
                ))
            }
        };

        let next = self.check(result)?;
        if next != self.state {
            tracing::debug!(
                from = ?self.state,
                to = ?next,
                level = self.fifo.level(),
                "pipeline state change"
            );
            self.state = next;
            if next == PipelineState::Done {
                let result = self.sink.write_trailer();
                self.check(result)?;
            }
        }
        Ok(self.state)
    }

    /// Decode one frame, convert it and append it to the FIFO.
    pub fn pump(&mut self) -> Result<PumpOutcome> {
        let frame = match self.source.decode_frame()? {
            Step::Ready(frame) => frame,
            Step::NeedMoreInput => return Ok(PumpOutcome::Pending),
            Step::EndOfStream => return Ok(PumpOutcome::Finished),
        };

        let samples = frame.samples();
        let mut converted = SampleBlock::zeroed(self.fifo.layout(), samples)?;
        let produced = self.converter.convert(&frame, &mut converted)?;
        if produced > samples {
            return Err(TranscodeError::Integrity(format!(
                "converter produced {} samples from {}",
                produced, samples
            )));
        }
        self.fifo.write(&converted, produced)?;

        self.stats.decoded_frames += 1;
        self.stats.decoded_samples += produced as u64;
        tracing::debug!(samples = produced, level = self.fifo.level(), "frame stored");
        Ok(PumpOutcome::Stored(produced))
    }

    /// Take one encoder frame's worth of samples (or whatever is left, if
    /// less) from the FIFO, encode it and write the resulting packets.
    pub fn drain(&mut self) -> Result<usize> {
        let frame_size = self.fifo.level().min(self.frame_size);
        if frame_size == 0 {
            return Err(TranscodeError::Integrity(
                "drain called on an empty FIFO".into(),
            ));
        }

        let mut frame = self.fifo.read(frame_size)?;
        frame.set_pts(Some(self.next_pts));
        self.next_pts += frame_size as i64;

        self.encode(Some(&frame))?;

        self.stats.encoded_frames += 1;
        self.stats.encoded_samples += frame_size as u64;
        tracing::debug!(frame_size, pts = self.next_pts - frame_size as i64, "frame encoded");
        Ok(frame_size)
    }

    /// Push a frame (or a flush request) and write every packet the encoder
    /// has ready. Returns the number of packets written.
    fn encode(&mut self, frame: Option<&SampleBlock>) -> Result<u64> {
        self.encoder.send_frame(frame)?;

        let mut written = 0;
        while let Step::Ready(packet) = self.encoder.receive_packet()? {
            self.sink.write_packet(packet)?;
            written += 1;
        }
        self.stats.packets_written += written;
        Ok(written)
    }

    fn fill(&mut self) -> Result<PipelineState> {
        self.stats.fill_cycles += 1;
        while self.fifo.level() < self.frame_size {
            if self.pump()? == PumpOutcome::Finished {
                tracing::debug!(level = self.fifo.level(), "end of input");
                self.finished = true;
                break;
            }
        }
        Ok(PipelineState::Draining)
    }

    fn drain_ready(&mut self) -> Result<PipelineState> {
        while self.fifo.level() >= self.frame_size || (self.finished && self.fifo.level() > 0) {
            self.drain()?;
        }
        Ok(if self.finished {
            PipelineState::Flushing
        } else {
            PipelineState::Filling
        })
    }

    fn flush(&mut self) -> Result<PipelineState> {
        loop {
            let written = self.encode(None)?;
            self.stats.flush_packets += written;
            if written == 0 {
                return Ok(PipelineState::Done);
            }
        }
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!(state = ?self.state, error = %e, "pipeline failed");
            self.state = PipelineState::Failed;
        }
        result
    }
}
