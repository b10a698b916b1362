use thiserror::Error;

use lc_capture::CaptureError;
use lc_codec::CodecError;
use lc_stream::StreamerError;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] StreamerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// The pipeline stage the failure belongs to, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            StreamError::Capture(_) => "capture",
            StreamError::Codec(_) => "codec",
            StreamError::Transport(_) => "transport",
            StreamError::Config(_) => "config",
            StreamError::Io(_) => "io",
        }
    }

    /// Process exit status. Device, codec, and transport failures are
    /// distinguishable to callers; everything else is a generic failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StreamError::Capture(_) => 2,
            StreamError::Codec(_) => 3,
            StreamError::Transport(_) => 4,
            StreamError::Config(_) | StreamError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_stages_have_distinct_exit_codes() {
        let codec = StreamError::from(CodecError::EncoderNotFound);
        let transport = StreamError::from(StreamerError::NotOpen);
        let config = StreamError::Config("bad".into());
        let io = StreamError::from(std::io::Error::other("disk"));

        assert_eq!(codec.exit_code(), 3);
        assert_eq!(transport.exit_code(), 4);
        assert_eq!(config.exit_code(), 1);
        assert_eq!(io.exit_code(), 1);

        assert_eq!(codec.stage(), "codec");
        assert_eq!(transport.stage(), "transport");
        assert_eq!(config.stage(), "config");
    }
}
