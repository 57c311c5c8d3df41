//! Camera Functions
//!

use image::RgbImage;
use rscam::{Camera, Config};

use crate::module::error::ScanError;
use crate::module::util::conf;

/// Source of still frames for the pipeline.
///
/// The V4L2 camera implements this in production; tests feed stored fixture
/// images through the same seam.
pub trait ImageSource {
    /// Capture one frame. Bounded latency; failures and sub-budget expiry
    /// are reported as `ScanError::Capture`.
    fn capture(&mut self) -> Result<RgbImage, ScanError>;
}

/// V4L2 still-capture device.
///
pub struct V4l2Camera {
    cap: Camera,
    grab_times: u8,
}

impl V4l2Camera {
    /// Open and start the configured V4L2 device.
    ///
    pub fn new(conf: &conf::Camera) -> Result<Self, ScanError> {
        let device = format!("/dev/video{}", conf.video_idx.max(0));
        let mut cap =
            Camera::new(&device).map_err(|e| ScanError::Capture(format!("{}: {}", device, e)))?;

        cap.start(&Config {
            interval: (1, 30), // 30 fps.
            resolution: (conf.width as u32, conf.height as u32),
            format: b"MJPG",
            nbuffers: 1,
            ..Default::default()
        })
        .map_err(|e| ScanError::Capture(format!("camera start: {}", e)))?;

        Ok(Self {
            cap,
            grab_times: conf.grab_times,
        })
    }
}

impl ImageSource for V4l2Camera {
    fn capture(&mut self) -> Result<RgbImage, ScanError> {
        // Grab and discard buffered frames to reduce delay.
        for _ in 1..self.grab_times.max(1) {
            let _ = self.cap.capture();
        }
        let frame = self
            .cap
            .capture()
            .map_err(|e| ScanError::Capture(format!("frame grab: {}", e)))?;
        let decoded = image::load_from_memory(&frame)
            .map_err(|e| ScanError::Capture(format!("frame decode: {}", e)))?;
        Ok(decoded.to_rgb8())
    }
}
