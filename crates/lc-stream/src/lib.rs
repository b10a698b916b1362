mod rtsp;

use thiserror::Error;

use lc_codec::{EncodedPacket, StreamParams};

pub use rtsp::RtspMuxer;

pub type Result<T> = std::result::Result<T, StreamerError>;

#[derive(Debug, Error)]
pub enum StreamerError {
    #[error("failed to open output transport: {0}")]
    Open(#[source] ffmpeg_next::Error),

    #[error("failed to write container header: {0}")]
    Header(#[source] ffmpeg_next::Error),

    #[error("failed to write packet: {0}")]
    Write(#[source] ffmpeg_next::Error),

    #[error("failed to write container trailer: {0}")]
    Trailer(#[source] ffmpeg_next::Error),

    #[error("stream is already open")]
    AlreadyOpen,

    #[error("stream is not open")]
    NotOpen,
}

/// Container/session output for encoded packets.
///
/// `open` connects the transport and writes the container header, exactly
/// once, from the encoder's negotiated parameters. `write_packet` rescales
/// timestamps into the stream time base and writes packets in the order
/// received. `close` writes the trailer and releases the transport; it is
/// idempotent and a trailer failure leaves the transport released anyway.
pub trait StreamSink {
    fn open(&mut self, params: &StreamParams) -> Result<()>;
    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
