use std::sync::Arc;

use color_lock_capture::{backend_from_config, CaptureError, CaptureSession, DeviceLocator};
use color_lock_common::config::Config;
use color_lock_vision::{ColorLock, FramePipeline};

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub color_lock: Arc<ColorLock>,
}

impl AppState {
    pub fn new(color_lock: ColorLock) -> Self {
        Self {
            color_lock: Arc::new(color_lock),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CaptureError> {
        let backend = backend_from_config(&config.capture)?;
        let locator = DeviceLocator::new(backend, config.capture.max_index);
        let pipeline = FramePipeline::new(config.sampler.radius, config.stream.quality);
        Ok(Self::new(ColorLock::new(CaptureSession::new(locator), pipeline)))
    }
}
