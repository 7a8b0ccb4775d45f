//! Elastic sample FIFO
//!
//! Decouples the decoder's frame size from the encoder's: converted samples
//! are appended at the tail in whatever amounts the decoder yields, and
//! consumed from the head one encoder frame at a time.

use bytes::BytesMut;

use crate::error::{Result, TranscodeError};

use super::sample::{SampleBlock, SampleLayout};

/// Growable queue of samples in the encoder's input format.
#[derive(Debug)]
pub struct SampleFifo {
    layout: SampleLayout,
    planes: Vec<BytesMut>,
    level: usize,
}

impl SampleFifo {
    /// Create an empty FIFO with room for `initial_samples` samples.
    pub fn new(layout: SampleLayout, initial_samples: usize) -> Result<Self> {
        let bytes = layout.plane_bytes(initial_samples)?;
        Ok(Self {
            layout,
            planes: (0..layout.planes())
                .map(|_| BytesMut::with_capacity(bytes))
                .collect(),
            level: 0,
        })
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// Number of samples waiting to be consumed.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_empty(&self) -> bool {
        self.level == 0
    }

    /// Samples the FIFO can hold before it has to grow again.
    pub fn capacity(&self) -> usize {
        let bps = self.layout.bytes_per_sample();
        self.planes
            .iter()
            .map(|p| p.capacity() / bps)
            .min()
            .unwrap_or(0)
    }

    /// Grow the backing storage so it holds at least `samples` samples.
    pub fn reserve_total(&mut self, samples: usize) -> Result<()> {
        let bytes = self.layout.plane_bytes(samples)?;
        for plane in &mut self.planes {
            if plane.capacity() < bytes {
                plane.reserve(bytes - plane.len());
            }
        }
        Ok(())
    }

    /// Append the first `count` samples of `block`, growing as needed.
    ///
    /// Fails with an integrity error if the block holds fewer samples or a
    /// different geometry than requested; nothing is appended in that case.
    pub fn write(&mut self, block: &SampleBlock, count: usize) -> Result<()> {
        if block.layout() != self.layout {
            return Err(TranscodeError::Integrity(format!(
                "block layout {:?} does not match FIFO layout {:?}",
                block.layout(),
                self.layout
            )));
        }
        if count > block.samples() {
            return Err(TranscodeError::Integrity(format!(
                "could not write {} samples to FIFO, block holds {}",
                count,
                block.samples()
            )));
        }

        let total = self.level.checked_add(count).ok_or_else(|| {
            TranscodeError::ResourceExhaustion("FIFO level overflow".into())
        })?;
        self.reserve_total(total)?;

        let bytes = self.layout.plane_bytes(count)?;
        for (plane, src) in self.planes.iter_mut().zip(block.planes()) {
            plane.extend_from_slice(&src[..bytes]);
        }
        self.level = total;
        Ok(())
    }

    /// Remove exactly `count` samples from the head.
    pub fn read(&mut self, count: usize) -> Result<SampleBlock> {
        if count > self.level {
            return Err(TranscodeError::Integrity(format!(
                "could not read {} samples from FIFO, only {} buffered",
                count, self.level
            )));
        }

        let bytes = self.layout.plane_bytes(count)?;
        let planes = self
            .planes
            .iter_mut()
            .map(|plane| plane.split_to(bytes))
            .collect();
        self.level -= count;
        SampleBlock::from_planes(self.layout, planes, count)
    }
}
