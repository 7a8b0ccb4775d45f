//! Single-stream audio transcoder
//!
//! Decodes the one audio stream of an input file, converts its samples to
//! the encoder's format, re-chunks them to the encoder's frame size and
//! writes AAC or MP3 into the container named by the output extension.

pub mod api;
pub mod config;
pub mod error;
pub mod ffmpeg_utils;
pub mod transcode;

#[cfg(test)]
pub(crate) mod tests;

pub use api::transcode_file;
pub use config::{OutputCodec, TranscodeConfig};
pub use error::{ErrorKind, FfmpegError, Result, TranscodeError};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use transcode::TranscodeStats;
