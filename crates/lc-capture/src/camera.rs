use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{debug, info, warn};

use crate::{CaptureError, FrameSource, RawFrame, Result, SourceFormat};

/// Webcam-backed frame source.
///
/// The device is opened and its stream started in `open`; resolution and
/// frame rate are probed there and stay fixed for the lifetime of the
/// source. Frames are delivered as packed RGB24.
pub struct CameraSource {
    camera: Camera,
    width: u32,
    height: u32,
    frame_rate: u32,
    frames_read: u64,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|source| CaptureError::Open { index, source })?;
        camera
            .open_stream()
            .map_err(|source| CaptureError::Open { index, source })?;

        let resolution = camera.resolution();
        let frame_rate = camera.frame_rate();

        info!(
            "capture device {} open: {}x{} @ {} fps",
            index,
            resolution.width(),
            resolution.height(),
            frame_rate
        );
        if frame_rate == 0 {
            warn!("capture device {} does not report a frame rate", index);
        }

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
            frame_rate,
            frames_read: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame rate as reported by the device; 0 when the device does not
    /// report one.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn format(&self) -> SourceFormat {
        SourceFormat::Rgb24
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let buffer = self.camera.frame().map_err(CaptureError::Device)?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(CaptureError::Decode)?;

        let width = image.width();
        let height = image.height();
        let data = image.into_raw();

        self.frames_read += 1;
        if self.frames_read % 300 == 0 {
            debug!("captured {} frames", self.frames_read);
        }

        // decode_image yields tightly packed rows
        Ok(Some(RawFrame {
            data,
            width,
            height,
            stride: width as usize * SourceFormat::Rgb24.bytes_per_pixel(),
            format: SourceFormat::Rgb24,
        }))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("failed to stop capture stream: {}", e);
        }
    }
}
