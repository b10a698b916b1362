use ffmpeg_next as ffmpeg;

use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::util::frame;
use tracing::debug;

use lc_capture::{RawFrame, SourceFormat};

use crate::{source_pixel, CodecError, ConvertedFrame, FrameConverter, Result};

/// swscale-backed converter from packed device frames to the encoder's
/// planar layout. Geometry and formats are fixed at construction; a frame
/// that disagrees is a device anomaly and is rejected.
pub struct SwsConverter {
    scaler: scaling::Context,
    staging: frame::Video,
    width: u32,
    height: u32,
    format: SourceFormat,
}

impl SwsConverter {
    pub fn new(format: SourceFormat, width: u32, height: u32, target: Pixel) -> Result<Self> {
        let src = source_pixel(format);
        let scaler = scaling::Context::get(
            src,
            width,
            height,
            target,
            width,
            height,
            scaling::flag::Flags::BILINEAR,
        )
        .map_err(CodecError::Converter)?;

        debug!(
            "color converter ready: {:?} -> {:?} at {}x{}",
            src, target, width, height
        );

        Ok(Self {
            scaler,
            staging: frame::Video::new(src, width, height),
            width,
            height,
            format,
        })
    }

    fn check_geometry(&self, raw: &RawFrame) -> Result<()> {
        let row = raw.row_bytes();
        let span = raw.stride * (raw.height.max(1) as usize - 1) + row;
        if raw.width != self.width
            || raw.height != self.height
            || raw.format != self.format
            || raw.stride < row
            || raw.data.len() < span
        {
            return Err(CodecError::ConfigMismatch {
                expected_width: self.width,
                expected_height: self.height,
                expected_row: self.width as usize * self.format.bytes_per_pixel(),
                width: raw.width,
                height: raw.height,
                stride: raw.stride,
            });
        }
        Ok(())
    }
}

impl FrameConverter for SwsConverter {
    fn convert(&mut self, raw: &RawFrame, pts: i64) -> Result<ConvertedFrame> {
        self.check_geometry(raw)?;

        // Source rows may carry alignment padding and the staging frame has
        // its own linesize, so rows are copied one at a time.
        let row = raw.row_bytes();
        let stride = self.staging.stride(0);
        let plane = self.staging.data_mut(0);
        for y in 0..raw.height as usize {
            plane[y * stride..y * stride + row]
                .copy_from_slice(&raw.data[y * raw.stride..y * raw.stride + row]);
        }

        let mut converted = frame::Video::empty();
        self.scaler
            .run(&self.staging, &mut converted)
            .map_err(CodecError::Converter)?;

        Ok(ConvertedFrame::new(converted, pts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32, stride: usize) -> RawFrame {
        RawFrame {
            data: vec![128; stride * height as usize],
            width,
            height,
            stride,
            format: SourceFormat::Rgb24,
        }
    }

    #[test]
    fn converts_to_planar_yuv() {
        let mut converter = SwsConverter::new(SourceFormat::Rgb24, 64, 48, Pixel::YUV420P)
            .expect("converter");

        let converted = converter.convert(&rgb_frame(64, 48, 64 * 3), 0).expect("convert");
        assert_eq!(converted.frame().format(), Pixel::YUV420P);
        assert_eq!(converted.frame().width(), 64);
        assert_eq!(converted.frame().height(), 48);
        assert_eq!(converted.pts(), 0);
    }

    #[test]
    fn accepts_padded_rows() {
        let mut converter = SwsConverter::new(SourceFormat::Rgb24, 62, 48, Pixel::YUV420P)
            .expect("converter");

        // 62 * 3 = 186 payload bytes per row, padded to 192
        let converted = converter.convert(&rgb_frame(62, 48, 192), 7).expect("convert");
        assert_eq!(converted.pts(), 7);
    }

    #[test]
    fn rejects_mismatched_geometry() {
        let mut converter = SwsConverter::new(SourceFormat::Rgb24, 64, 48, Pixel::YUV420P)
            .expect("converter");

        let result = converter.convert(&rgb_frame(32, 48, 32 * 3), 0);
        assert!(matches!(result, Err(CodecError::ConfigMismatch { .. })));

        // stride shorter than one row of payload
        let result = converter.convert(&rgb_frame(64, 48, 64), 0);
        assert!(matches!(result, Err(CodecError::ConfigMismatch { .. })));
    }
}
