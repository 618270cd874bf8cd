pub mod backend;
pub mod locator;
pub mod mjpeg;
pub mod session;
#[cfg(feature = "v4l")]
pub mod webcam;

use std::sync::Arc;
use std::time::Duration;

use color_lock_common::config::CaptureConfig;
use color_lock_common::frame::FrameError;

pub use backend::{CaptureBackend, CaptureDevice};
pub use locator::DeviceLocator;
pub use session::{CaptureSession, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no capture device opened after trying indices 0..{tried}")]
    DeviceUnavailable { tried: u32 },
    #[error("failed to open device {index}: {reason}")]
    Open { index: u32, reason: String },
    #[error("frame read failed: {0}")]
    Read(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("unknown capture backend {0:?}, expected 'mjpeg' or 'v4l'")]
    UnknownBackend(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Build the backend named by `capture.backend`.
pub fn backend_from_config(config: &CaptureConfig) -> Result<Arc<dyn CaptureBackend>, CaptureError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let read_timeout = Duration::from_secs(config.read_timeout_secs);
    match config.backend.as_str() {
        "mjpeg" => Ok(Arc::new(mjpeg::MjpegBackend::new(
            config.mjpeg_urls.clone(),
            connect_timeout,
            read_timeout,
        ))),
        #[cfg(feature = "v4l")]
        "v4l" => Ok(Arc::new(webcam::V4lBackend::new(
            config.width,
            config.height,
            read_timeout,
        ))),
        other => Err(CaptureError::UnknownBackend(other.to_string())),
    }
}
