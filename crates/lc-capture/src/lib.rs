mod camera;

use thiserror::Error;

pub use camera::CameraSource;

// Callers construct backend errors through this.
pub use nokhwa;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open capture device {index}: {source}")]
    Open {
        index: u32,
        source: nokhwa::NokhwaError,
    },

    #[error("capture device error: {0}")]
    Device(#[from] nokhwa::NokhwaError),

    #[error("failed to decode captured frame: {0}")]
    Decode(nokhwa::NokhwaError),
}

/// Color channel order of a raw device frame. All supported layouts are
/// packed, 3 bytes per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Rgb24,
    Bgr24,
}

impl SourceFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            SourceFormat::Rgb24 | SourceFormat::Bgr24 => 3,
        }
    }
}

/// One frame as produced by the capture device: packed pixels in
/// device-native channel order. `stride` is bytes per row and may exceed
/// `width * bytes_per_pixel` on devices that pad rows for alignment.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: SourceFormat,
}

impl RawFrame {
    /// Payload bytes per row, excluding any alignment padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

/// A blocking producer of raw frames.
///
/// `Ok(None)` means the device has permanently stopped producing frames;
/// the caller is expected to shut the session down. Transient "no frame
/// ready yet" conditions are handled inside the implementation by blocking.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_bytes_excludes_padding() {
        let frame = RawFrame {
            data: vec![0; 648 * 480],
            width: 214,
            height: 480,
            stride: 648,
            format: SourceFormat::Rgb24,
        };

        assert_eq!(frame.row_bytes(), 642);
        assert!(frame.stride >= frame.row_bytes());
    }
}
