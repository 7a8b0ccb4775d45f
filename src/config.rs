//! Transcoder configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TranscodeError};

/// Output bit rate in bit/s
pub const DEFAULT_BIT_RATE: u64 = 96_000;
/// Number of output channels
pub const DEFAULT_CHANNELS: u16 = 2;

/// Audio codec written to the output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    Aac,
    Mp3,
}

impl OutputCodec {
    /// Pick a codec from the output file extension: `.mp3` gets MP3, every
    /// other container gets AAC.
    pub fn for_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp3") => OutputCodec::Mp3,
            _ => OutputCodec::Aac,
        }
    }

    /// The FFmpeg codec id for this codec.
    pub fn codec_id(self) -> ffmpeg_next::codec::Id {
        match self {
            OutputCodec::Aac => ffmpeg_next::codec::Id::AAC,
            OutputCodec::Mp3 => ffmpeg_next::codec::Id::MP3,
        }
    }
}

/// Transcoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Output codec; inferred from the output extension when unset
    pub codec: Option<OutputCodec>,

    /// Encoder bit rate in bps
    pub bit_rate: u64,

    /// Output channel count (1 or 2)
    pub channels: u16,

    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            codec: None,
            bit_rate: DEFAULT_BIT_RATE,
            channels: DEFAULT_CHANNELS,
            log_level: "audio_transcoder=info".to_string(),
        }
    }
}

impl TranscodeConfig {
    /// Resolve the output codec for a given output path.
    pub fn codec_for(&self, output: &Path) -> OutputCodec {
        self.codec.unwrap_or_else(|| OutputCodec::for_path(output))
    }

    /// Check the values an encoder can actually be opened with.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.channels, 1 | 2) {
            return Err(TranscodeError::Config(format!(
                "unsupported output channel count {} (expected 1 or 2)",
                self.channels
            )));
        }
        if self.bit_rate == 0 {
            return Err(TranscodeError::Config("bit rate must be positive".into()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: TranscodeConfig = toml::from_str(&content)
            .map_err(|e| TranscodeError::Config(format!("invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TranscodeError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}
