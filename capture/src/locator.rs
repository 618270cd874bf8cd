use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{CaptureBackend, CaptureDevice};
use crate::CaptureError;

/// Sweeps device indices `0..max_index` in ascending order and returns the
/// first one the backend reports as opened.
///
/// Rejected candidates are released before the next index is tried, so a
/// failed sweep leaves no device open.
pub struct DeviceLocator {
    backend: Arc<dyn CaptureBackend>,
    max_index: u32,
}

impl DeviceLocator {
    pub const DEFAULT_MAX_INDEX: u32 = 5;

    pub fn new(backend: Arc<dyn CaptureBackend>, max_index: u32) -> Self {
        Self { backend, max_index }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn locate(&self) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        for index in 0..self.max_index {
            debug!(index, backend = self.backend.name(), "trying capture device");
            match self.backend.open(index) {
                Ok(device) if device.is_opened() => {
                    info!(index, backend = self.backend.name(), "capture device opened");
                    return Ok(device);
                }
                Ok(mut device) => {
                    debug!(index, "device not usable, releasing");
                    device.release();
                }
                Err(e) => {
                    warn!(index, error = %e, "failed to open capture device");
                }
            }
        }
        warn!(tried = self.max_index, "no capture device found");
        Err(CaptureError::DeviceUnavailable {
            tried: self.max_index,
        })
    }
}
