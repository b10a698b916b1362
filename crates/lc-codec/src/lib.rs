mod convert;
mod h264;
mod timebase;

use bytes::Bytes;
use thiserror::Error;

use lc_capture::SourceFormat;

pub use convert::SwsConverter;
pub use h264::H264Encoder;
pub use timebase::TimeBase;

// Callers construct frames and parameters through these types.
pub use ffmpeg_next as ffmpeg;

use ffmpeg::codec::Parameters;
use ffmpeg::format::Pixel;
use ffmpeg::util::frame;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("H.264 encoder not available in this ffmpeg build")]
    EncoderNotFound,

    #[error("failed to open codec: {0}")]
    Open(#[source] ffmpeg::Error),

    #[error("failed to initialize color converter: {0}")]
    Converter(#[source] ffmpeg::Error),

    #[error(
        "frame does not match session geometry: expected {expected_width}x{expected_height} \
         ({expected_row} bytes/row), got {width}x{height} (stride {stride})"
    )]
    ConfigMismatch {
        expected_width: u32,
        expected_height: u32,
        expected_row: usize,
        width: u32,
        height: u32,
        stride: usize,
    },

    #[error("encoder rejected frame: {0}")]
    Submit(#[source] ffmpeg::Error),

    #[error("failed to retrieve packet from encoder: {0}")]
    Drain(#[source] ffmpeg::Error),

    #[error("operation not valid while encoder is {0}")]
    InvalidState(&'static str),
}

/// Encode parameters applied when the codec session is opened. Dimensions
/// and pixel format are immutable afterwards.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bit_rate: usize,
    pub gop_size: u32,
    pub max_b_frames: usize,
    pub pixel_format: Pixel,
    /// Emit SPS/PPS as out-of-band extradata rather than only in-band.
    pub global_header: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            frame_rate: 30,
            bit_rate: 400_000,
            gop_size: 12,
            max_b_frames: 2,
            pixel_format: Pixel::YUV420P,
            global_header: true,
        }
    }
}

impl EncoderConfig {
    /// The codec time base: one tick per frame.
    pub fn time_base(&self) -> TimeBase {
        TimeBase::new(1, self.frame_rate as i32)
    }
}

/// A frame in the encoder's pixel layout, stamped with its presentation
/// timestamp in codec time-base ticks.
pub struct ConvertedFrame {
    frame: frame::Video,
    pts: i64,
}

impl ConvertedFrame {
    pub fn new(mut frame: frame::Video, pts: i64) -> Self {
        frame.set_pts(Some(pts));
        Self { frame, pts }
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn frame(&self) -> &frame::Video {
        &self.frame
    }
}

/// One compressed bitstream unit. Timestamps are expressed in `time_base`;
/// the streamer rescales them into the container's stream time base before
/// writing.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub data: Bytes,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub stream_index: usize,
    pub keyframe: bool,
    pub time_base: TimeBase,
}

impl EncodedPacket {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Negotiated output description of an opened encoder, used to derive the
/// container header. Final once the encoder has opened.
#[derive(Clone)]
pub struct StreamParams {
    pub parameters: Parameters,
    pub time_base: TimeBase,
    pub width: u32,
    pub height: u32,
}

/// Result of one `drain` pull.
#[derive(Debug, Clone)]
pub enum DrainOutcome {
    /// A packet was ready.
    Packet(EncodedPacket),
    /// Nothing ready right now; more input may produce more output. Not an
    /// error.
    Pending,
    /// Terminal: the flush has completed and no further packets will ever
    /// be produced. Only valid after `begin_flush`.
    Finished,
}

/// Converts raw device frames into the encoder's pixel layout. Bound at
/// construction to a fixed geometry and format pair.
pub trait FrameConverter {
    fn convert(&mut self, raw: &lc_capture::RawFrame, pts: i64) -> Result<ConvertedFrame>;
}

/// A stateful codec session.
///
/// The encoder may buffer frames internally for reordering, so `drain`
/// must be called in a loop after every `submit` until it reports
/// `Pending`. Shutdown protocol: `begin_flush` submits the end-of-stream
/// sentinel, after which `drain` is called until it reports `Finished`.
/// Every frame submitted before the flush has a corresponding packet by
/// the time `Finished` is reported.
pub trait VideoEncoder {
    fn stream_params(&self) -> StreamParams;
    fn submit(&mut self, frame: &ConvertedFrame) -> Result<()>;
    fn drain(&mut self) -> Result<DrainOutcome>;
    fn begin_flush(&mut self) -> Result<()>;
}

/// ffmpeg pixel format for a device frame layout.
pub fn source_pixel(format: SourceFormat) -> Pixel {
    match format {
        SourceFormat::Rgb24 => Pixel::RGB24,
        SourceFormat::Bgr24 => Pixel::BGR24,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_session_defaults() {
        let config = EncoderConfig::default();

        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.bit_rate, 400_000);
        assert_eq!(config.gop_size, 12);
        assert_eq!(config.max_b_frames, 2);
        assert_eq!(config.pixel_format, Pixel::YUV420P);
        assert_eq!(config.time_base(), TimeBase::new(1, 30));
    }

    #[test]
    fn converted_frame_carries_its_pts() {
        let converted = ConvertedFrame::new(frame::Video::empty(), 41);

        assert_eq!(converted.pts(), 41);
        assert_eq!(converted.frame().pts(), Some(41));
    }

    #[test]
    fn source_formats_map_to_packed_pixels() {
        assert_eq!(source_pixel(SourceFormat::Rgb24), Pixel::RGB24);
        assert_eq!(source_pixel(SourceFormat::Bgr24), Pixel::BGR24);
    }
}
