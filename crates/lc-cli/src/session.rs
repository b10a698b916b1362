use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use lc_capture::CameraSource;
use lc_codec::{H264Encoder, SwsConverter};
use lc_core::{Pipeline, SessionStats, StreamConfig, StreamError};
use lc_stream::RtspMuxer;

/// Brings the session up in acquisition order — device, converter, codec,
/// transport — and hands everything to the pipeline. Each component owns
/// its native resources, so any early return here releases whatever was
/// already acquired, in reverse order.
pub fn run(config: &StreamConfig, stop: Arc<AtomicBool>) -> Result<SessionStats, StreamError> {
    let source = CameraSource::open(config.capture.device)?;

    let (width, height) = (source.width(), source.height());
    let encoder_config = config.encoder_config(width, height, source.frame_rate());
    info!(
        "session parameters: {}x{} @ {} fps, {} bps",
        width, height, encoder_config.frame_rate, encoder_config.bit_rate
    );

    let converter = SwsConverter::new(
        source.format(),
        width,
        height,
        encoder_config.pixel_format,
    )?;
    let encoder = H264Encoder::open(&encoder_config)?;
    let sink = RtspMuxer::new(config.output.url.clone());

    Pipeline::new(source, converter, encoder, sink, stop).run()
}
