//! Stream descriptors and owned sample storage

use bytes::BytesMut;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{Result, TranscodeError};

/// Audio parameters of one endpoint (decoder output or encoder input).
///
/// Fixed once the endpoint is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamDescriptor {
    pub format: Sample,
    pub channel_layout: ChannelLayout,
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per codec frame. `None` for decoders, whose frame size may
    /// vary from call to call.
    pub frame_size: Option<usize>,
}

impl StreamDescriptor {
    /// Storage geometry for samples in this descriptor's format.
    pub fn layout(&self) -> SampleLayout {
        SampleLayout::new(self.format, self.channels)
    }
}

/// How samples of one format are laid out in memory.
///
/// Planar formats use one plane per channel; packed formats interleave all
/// channels in a single plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    planes: usize,
    bytes_per_sample: usize,
}

impl SampleLayout {
    pub fn new(format: Sample, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        if format.is_planar() {
            Self {
                planes: channels,
                bytes_per_sample: format.bytes(),
            }
        } else {
            Self {
                planes: 1,
                bytes_per_sample: format.bytes() * channels,
            }
        }
    }

    /// Number of data planes.
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// Bytes one sample occupies in each plane.
    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    /// Bytes `samples` samples occupy in each plane.
    pub fn plane_bytes(&self, samples: usize) -> Result<usize> {
        samples.checked_mul(self.bytes_per_sample).ok_or_else(|| {
            TranscodeError::ResourceExhaustion(format!(
                "{} samples overflow the addressable plane size",
                samples
            ))
        })
    }
}

/// A block of samples in one format, owned outright.
///
/// Used both for converter output on its way into the FIFO and for the
/// frames handed to the encoder.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    layout: SampleLayout,
    planes: Vec<BytesMut>,
    samples: usize,
    pts: Option<i64>,
}

impl SampleBlock {
    /// Allocate a zeroed block with room for exactly `samples` samples.
    pub fn zeroed(layout: SampleLayout, samples: usize) -> Result<Self> {
        let bytes = layout.plane_bytes(samples)?;
        Ok(Self {
            layout,
            planes: (0..layout.planes()).map(|_| BytesMut::zeroed(bytes)).collect(),
            samples,
            pts: None,
        })
    }

    /// Wrap planes that already hold `samples` samples each.
    pub(crate) fn from_planes(
        layout: SampleLayout,
        planes: Vec<BytesMut>,
        samples: usize,
    ) -> Result<Self> {
        let bytes = layout.plane_bytes(samples)?;
        if planes.len() != layout.planes() || planes.iter().any(|p| p.len() != bytes) {
            return Err(TranscodeError::Integrity(format!(
                "expected {} planes of {} bytes",
                layout.planes(),
                bytes
            )));
        }
        Ok(Self {
            layout,
            planes,
            samples,
            pts: None,
        })
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// Number of valid samples per channel.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        self.planes.get(index).map(|p| &p[..]).unwrap_or(&[])
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut [u8] {
        match self.planes.get_mut(index) {
            Some(p) => &mut p[..],
            None => &mut [],
        }
    }

    pub fn planes(&self) -> impl Iterator<Item = &[u8]> {
        self.planes.iter().map(|p| &p[..])
    }

    /// Shorten the block to its first `samples` samples.
    ///
    /// Used when the converter produced fewer samples than there was room for.
    pub fn truncate(&mut self, samples: usize) {
        if samples >= self.samples {
            return;
        }
        let bytes = samples * self.layout.bytes_per_sample();
        for plane in &mut self.planes {
            plane.truncate(bytes);
        }
        self.samples = samples;
    }

    /// Presentation timestamp in samples, set right before encoding.
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }
}
