use serde::{Deserialize, Serialize};

use lc_codec::EncoderConfig;

use crate::error::{Result, StreamError};

/// Used when the capture device does not report a frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 30;

pub const DEFAULT_OUTPUT_URL: &str = "rtsp://127.0.0.1:8554/camera";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub capture: CaptureConfig,
    pub video: VideoConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture device index.
    pub device: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub bitrate: usize,
    pub gop_size: u32,
    pub max_b_frames: usize,
    /// 0 means use the rate the device reports (or the fallback default).
    pub frame_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub url: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { device: 0 }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            bitrate: 400_000,
            gop_size: 12,
            max_b_frames: 2,
            frame_rate: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OUTPUT_URL.into(),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.video.bitrate < 10_000 || self.video.bitrate > 100_000_000 {
            return Err(StreamError::Config(format!(
                "bitrate {} out of range (10000-100000000 bps)",
                self.video.bitrate
            )));
        }

        if self.video.gop_size == 0 {
            return Err(StreamError::Config("gop_size must be at least 1".into()));
        }

        if self.video.frame_rate > 240 {
            return Err(StreamError::Config(format!(
                "frame_rate {} out of range (0-240)",
                self.video.frame_rate
            )));
        }

        if !self.output.url.starts_with("rtsp://") {
            return Err(StreamError::Config(format!(
                "output url must be rtsp:// (got {})",
                self.output.url
            )));
        }

        Ok(())
    }

    /// Encode parameters for a session on a device with the probed geometry.
    /// A configured frame rate wins; otherwise the device's reported rate is
    /// used, falling back to the default when the device reports 0.
    pub fn encoder_config(&self, width: u32, height: u32, device_rate: u32) -> EncoderConfig {
        let frame_rate = if self.video.frame_rate != 0 {
            self.video.frame_rate
        } else {
            effective_frame_rate(device_rate)
        };

        EncoderConfig {
            width,
            height,
            frame_rate,
            bit_rate: self.video.bitrate,
            gop_size: self.video.gop_size,
            max_b_frames: self.video.max_b_frames,
            ..EncoderConfig::default()
        }
    }
}

pub fn effective_frame_rate(reported: u32) -> u32 {
    if reported == 0 {
        DEFAULT_FRAME_RATE
    } else {
        reported
    }
}
