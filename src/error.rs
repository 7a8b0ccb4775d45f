use thiserror::Error;

/// Main error type for the transcoder
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer could not be grown to hold the requested samples
    #[error("Out of memory: {0}")]
    ResourceExhaustion(String),

    /// The input or output cannot be handled (stream count, codec, container)
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// A codec or the sample converter rejected data
    #[error("Codec error: {0}")]
    Codec(String),

    /// A sample buffer read or write came up short
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Transcoder configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening an input media file
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// Failure opening the output file or guessing its container
    #[error("Failed to open output file: {0}")]
    OpenOutput(String),

    /// The input does not contain exactly one audio stream
    #[error("Expected one audio input stream, but found {0}")]
    StreamCount(usize),

    /// The requested decoder for a specific codec ID was not found
    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    /// The requested encoder for a specific codec ID was not found
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure applying configuration parameters to an encoder
    #[error("Failed to configure encoder: {0}")]
    EncoderConfigure(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure converting samples
    #[error("Failed to convert samples: {0}")]
    Resample(String),

    /// Failure configuring the output stream
    #[error("Stream configuration failed: {0}")]
    StreamConfig(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure reading a packet from the input context
    #[error("Failed to read packet: {0}")]
    ReadPacket(String),

    /// Failure decoding a single packet into a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a single frame into a packet
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),
}

/// Failure category of a [`TranscodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceExhaustion,
    UnsupportedInput,
    IoFailure,
    CodecFailure,
    IntegrityFailure,
}

impl TranscodeError {
    /// Classify the error. Every failure is fatal; the kind only shapes the
    /// message the caller reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscodeError::ResourceExhaustion(_) => ErrorKind::ResourceExhaustion,
            TranscodeError::UnsupportedInput(_) | TranscodeError::Config(_) => {
                ErrorKind::UnsupportedInput
            }
            TranscodeError::Io(_) => ErrorKind::IoFailure,
            TranscodeError::Codec(_) => ErrorKind::CodecFailure,
            TranscodeError::Integrity(_) => ErrorKind::IntegrityFailure,
            TranscodeError::Ffmpeg(e) => e.kind(),
        }
    }
}

impl FfmpegError {
    fn kind(&self) -> ErrorKind {
        match self {
            FfmpegError::StreamCount(_)
            | FfmpegError::DecoderNotFound(_)
            | FfmpegError::EncoderNotFound(_)
            | FfmpegError::EncoderConfigure(_)
            | FfmpegError::ResamplerCreate(_)
            | FfmpegError::StreamConfig(_) => ErrorKind::UnsupportedInput,
            FfmpegError::InitFailed(_)
            | FfmpegError::OpenInput(_)
            | FfmpegError::OpenOutput(_)
            | FfmpegError::WriteHeader(_)
            | FfmpegError::WritePacket(_)
            | FfmpegError::WriteTrailer(_)
            | FfmpegError::ReadPacket(_) => ErrorKind::IoFailure,
            FfmpegError::Resample(_) | FfmpegError::DecodePacket(_) | FfmpegError::EncodeFrame(_) => {
                ErrorKind::CodecFailure
            }
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_ffmpeg_errors() {
        let err = TranscodeError::from(FfmpegError::StreamCount(2));
        assert_eq!(err.kind(), ErrorKind::UnsupportedInput);
        assert_eq!(
            err.to_string(),
            "FFmpeg error: Expected one audio input stream, but found 2"
        );

        let err = TranscodeError::from(FfmpegError::WritePacket("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::IoFailure);

        let err = TranscodeError::from(FfmpegError::DecodePacket("bad data".into()));
        assert_eq!(err.kind(), ErrorKind::CodecFailure);
    }

    #[test]
    fn test_kind_of_pipeline_errors() {
        assert_eq!(
            TranscodeError::Integrity("short read".into()).kind(),
            ErrorKind::IntegrityFailure
        );
        assert_eq!(
            TranscodeError::ResourceExhaustion("fifo".into()).kind(),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(
            TranscodeError::Config("channels".into()).kind(),
            ErrorKind::UnsupportedInput
        );
    }
}
