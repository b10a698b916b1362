use std::ffi::CString;
use std::ptr;

use ffmpeg_next as ffmpeg;

use ffmpeg::codec;
use ffmpeg::codec::packet::flag::Flags as PacketFlags;
use ffmpeg::format;
use ffmpeg::sys as ffi;
use ffmpeg::Rational;
use tracing::{debug, info, warn};

use lc_codec::{EncodedPacket, StreamParams, TimeBase};

use crate::{Result, StreamSink, StreamerError};

/// Allocates an output context for `url`. Session-oriented muxers like
/// rtsp drive their own transport (AVFMT_NOFILE) and connect during the
/// header write; only file-backed formats get an avio handle here.
fn open_output(url: &str, format: &str) -> Result<format::context::Output> {
    let c_url =
        CString::new(url).map_err(|_| StreamerError::Open(ffmpeg::Error::InvalidData))?;
    let c_format =
        CString::new(format).map_err(|_| StreamerError::Open(ffmpeg::Error::InvalidData))?;

    unsafe {
        let mut ps = ptr::null_mut();
        match ffi::avformat_alloc_output_context2(
            &mut ps,
            ptr::null_mut(),
            c_format.as_ptr(),
            c_url.as_ptr(),
        ) {
            0 => {
                if (*(*ps).oformat).flags & ffi::AVFMT_NOFILE == 0 {
                    let e = ffi::avio_open(&mut (*ps).pb, c_url.as_ptr(), ffi::AVIO_FLAG_WRITE);
                    if e < 0 {
                        ffi::avformat_free_context(ps);
                        return Err(StreamerError::Open(ffmpeg::Error::from(e)));
                    }
                }
                Ok(format::context::Output::wrap(ps))
            }
            e => Err(StreamerError::Open(ffmpeg::Error::from(e))),
        }
    }
}

/// RTSP session output: one video stream, announced to a server that is
/// already listening at the destination URL.
pub struct RtspMuxer {
    url: String,
    octx: Option<format::context::Output>,
    stream_index: usize,
    stream_time_base: TimeBase,
    header_written: bool,
    trailer_written: bool,
    packets_written: u64,
    bytes_written: u64,
}

impl RtspMuxer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            octx: None,
            stream_index: 0,
            stream_time_base: TimeBase::new(1, 90_000),
            header_written: false,
            trailer_written: false,
            packets_written: 0,
            bytes_written: 0,
        }
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }
}

impl StreamSink for RtspMuxer {
    fn open(&mut self, params: &StreamParams) -> Result<()> {
        if self.octx.is_some() || self.header_written {
            return Err(StreamerError::AlreadyOpen);
        }

        let mut octx = open_output(&self.url, "rtsp")?;

        let index = {
            let mut ost = octx
                .add_stream(ffmpeg::encoder::find(codec::Id::H264))
                .map_err(StreamerError::Open)?;
            ost.set_parameters(params.parameters.clone());
            ost.set_time_base(Rational::from(params.time_base));
            ost.index()
        };

        octx.write_header().map_err(StreamerError::Header)?;
        self.header_written = true;

        // The muxer is free to replace the declared time base (RTP runs a
        // 90 kHz clock); read back what it settled on.
        self.stream_time_base = octx
            .stream(index)
            .map(|s| TimeBase::from(s.time_base()))
            .unwrap_or(params.time_base);
        self.stream_index = index;
        self.octx = Some(octx);

        info!(
            "rtsp session open: {} ({}x{}, stream time base {})",
            self.url, params.width, params.height, self.stream_time_base
        );
        Ok(())
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        let octx = self.octx.as_mut().ok_or(StreamerError::NotOpen)?;

        let from = packet.time_base;
        let to = self.stream_time_base;
        let mut out = ffmpeg::Packet::copy(&packet.data);
        out.set_stream(self.stream_index);
        out.set_pts(packet.pts.map(|t| from.rescale(t, to)));
        out.set_dts(packet.dts.map(|t| from.rescale(t, to)));
        out.set_duration(from.rescale(packet.duration, to));
        if packet.keyframe {
            out.set_flags(PacketFlags::KEY);
        }

        out.write_interleaved(octx).map_err(StreamerError::Write)?;

        self.packets_written += 1;
        self.bytes_written += packet.data.len() as u64;
        if self.packets_written % 300 == 0 {
            debug!(
                "wrote {} packets ({} KiB)",
                self.packets_written,
                self.bytes_written / 1024
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // A second close, or a close before open, is a no-op.
        let Some(mut octx) = self.octx.take() else {
            return Ok(());
        };

        let result = if self.header_written && !self.trailer_written {
            self.trailer_written = true;
            octx.write_trailer().map_err(StreamerError::Trailer)
        } else {
            Ok(())
        };

        info!(
            "rtsp session closed: {} packets, {} KiB",
            self.packets_written,
            self.bytes_written / 1024
        );
        result
    }
}

impl Drop for RtspMuxer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("error while closing rtsp session: {}", e);
        }
    }
}
