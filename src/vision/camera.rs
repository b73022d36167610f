//! Capture devices.
//!
//! [`CaptureDevice`] is the narrow interface the display loop drives once per
//! cycle.  A read error is final: the display loop treats it as the device
//! having stopped and shuts the pipeline down.
//!
//! [`SnapshotCamera`] is the production implementation.  It fetches one
//! encoded still per read from an HTTP endpoint (IP cameras, phone webcam
//! apps, `mjpg-streamer`) and decodes it to RGB8.

use std::time::Duration;

use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;

use crate::config::CameraConfig;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device could not be opened at startup.
    #[error("could not open video device at {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("camera request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("camera returned an undecodable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("capture device stopped producing frames")]
    Stopped,

    /// The device was released by the display loop.
    #[error("capture device already released")]
    Released,
}

// ---------------------------------------------------------------------------
// CaptureDevice
// ---------------------------------------------------------------------------

/// A source of RGB8 frames paced by the device itself.
pub trait CaptureDevice: Send {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;
}

// ---------------------------------------------------------------------------
// SnapshotCamera
// ---------------------------------------------------------------------------

pub struct SnapshotCamera {
    client: reqwest::blocking::Client,
    url: String,
    /// Target size; `None` keeps whatever the camera sends.
    size: Option<(u32, u32)>,
}

impl std::fmt::Debug for SnapshotCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCamera")
            .field("url", &self.url)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SnapshotCamera {
    /// Open the camera and verify it answers with a decodable image.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Open`] when the HTTP client cannot be built or the
    /// first snapshot fails.
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::Open {
            url: config.snapshot_url.clone(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| open_err(e.to_string()))?;

        let size = (config.width > 0 && config.height > 0).then_some((config.width, config.height));
        let mut camera = Self {
            client,
            url: config.snapshot_url.clone(),
            size,
        };

        let first = camera.read_frame().map_err(|e| open_err(e.to_string()))?;
        log::info!(
            "camera: opened {} ({}x{} native)",
            camera.url,
            first.width(),
            first.height()
        );
        Ok(camera)
    }

    fn fetch(&self) -> Result<Vec<u8>, CaptureError> {
        let bytes = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .bytes()?;
        Ok(bytes.to_vec())
    }
}

impl CaptureDevice for SnapshotCamera {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let encoded = self.fetch()?;
        let decoded = image::load_from_memory(&encoded)?.to_rgb8();
        Ok(fit_to(decoded, self.size))
    }
}

/// Rescale `image` to `size` unless it already matches.
fn fit_to(image: RgbImage, size: Option<(u32, u32)>) -> RgbImage {
    match size {
        Some((w, h)) if image.dimensions() != (w, h) => {
            image::imageops::resize(&image, w, h, FilterType::Triangle)
        }
        _ => image,
    }
}

// ---------------------------------------------------------------------------
// FakeCamera  (test-only)
// ---------------------------------------------------------------------------

/// Test double that yields solid frames and then fails.
#[cfg(test)]
pub struct FakeCamera {
    remaining: usize,
    width: u32,
    height: u32,
}

#[cfg(test)]
impl FakeCamera {
    /// A camera that produces `frames` frames before reporting an error.
    pub fn with_frames(frames: usize) -> Self {
        Self {
            remaining: frames,
            width: 8,
            height: 6,
        }
    }
}

#[cfg(test)]
impl CaptureDevice for FakeCamera {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.remaining == 0 {
            return Err(CaptureError::Stopped);
        }
        self.remaining -= 1;
        Ok(RgbImage::from_pixel(
            self.width,
            self.height,
            image::Rgb([10, 20, 30]),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_to_resizes_mismatched_frames() {
        let img = RgbImage::new(320, 240);
        let out = fit_to(img, Some((640, 480)));
        assert_eq!(out.dimensions(), (640, 480));
    }

    #[test]
    fn fit_to_keeps_native_size_when_unset() {
        let img = RgbImage::new(320, 240);
        let out = fit_to(img, None);
        assert_eq!(out.dimensions(), (320, 240));
    }

    #[test]
    fn open_fails_for_unreachable_camera() {
        let config = CameraConfig {
            // Port 9 (discard) on localhost is practically never an HTTP server.
            snapshot_url: "http://127.0.0.1:9/shot.jpg".into(),
            request_timeout_ms: 300,
            ..CameraConfig::default()
        };
        let err = SnapshotCamera::open(&config).unwrap_err();
        assert!(matches!(err, CaptureError::Open { .. }), "got {err:?}");
        assert!(err.to_string().contains("127.0.0.1:9"));
    }

    #[test]
    fn fake_camera_stops_after_its_frames() {
        let mut cam = FakeCamera::with_frames(2);
        assert!(cam.read_frame().is_ok());
        assert!(cam.read_frame().is_ok());
        assert!(cam.read_frame().is_err());
    }
}
