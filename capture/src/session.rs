use std::sync::{Mutex, MutexGuard, PoisonError};

use color_lock_common::frame::Frame;
use tracing::{debug, info, warn};

use crate::backend::CaptureDevice;
use crate::locator::DeviceLocator;
use crate::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

struct SessionInner {
    /// `Some` exactly while the session is running.
    device: Option<Box<dyn CaptureDevice>>,
    /// Bumped on every Idle -> Running transition.
    generation: u64,
}

/// The single capture session of the process.
///
/// All access to the device handle goes through one mutex, so `stop()` waits
/// for an in-flight `read_frame()` to finish and a reader can never observe a
/// half-released handle. Release happens exactly once per handle because the
/// handle is taken out of the slot before it is released.
pub struct CaptureSession {
    locator: DeviceLocator,
    inner: Mutex<SessionInner>,
}

impl CaptureSession {
    pub fn new(locator: DeviceLocator) -> Self {
        Self {
            locator,
            inner: Mutex::new(SessionInner {
                device: None,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle -> Running. Starting a running session is a no-op and does not
    /// locate a second device. Returns the generation of the running session.
    pub fn start(&self) -> Result<u64, CaptureError> {
        let mut inner = self.lock();
        if inner.device.is_some() {
            debug!(generation = inner.generation, "capture already running");
            return Ok(inner.generation);
        }
        let device = self.locator.locate()?;
        inner.device = Some(device);
        inner.generation += 1;
        info!(
            generation = inner.generation,
            backend = self.locator.backend_name(),
            "capture session started"
        );
        Ok(inner.generation)
    }

    /// Running -> Idle. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if let Some(mut device) = inner.device.take() {
            device.release();
            info!(generation = inner.generation, "capture session stopped");
        }
    }

    pub fn state(&self) -> SessionState {
        if self.lock().device.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Generation of the current (or most recent) running session.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Whether the session is running under `generation`.
    pub fn is_running_as(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.device.is_some() && inner.generation == generation
    }

    /// Read one frame from the device of session `generation`.
    ///
    /// Returns `None` when the session is idle or has been restarted since
    /// `generation`. A failed read ends the session: the handle is released
    /// and the session goes back to Idle.
    pub fn read_frame(&self, generation: u64) -> Option<Frame> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        let device = inner.device.as_mut()?;
        match device.read() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, generation, "frame read failed, ending capture session");
                if let Some(mut device) = inner.device.take() {
                    device.release();
                }
                None
            }
        }
    }

    /// End session `generation` if it is still the running one. Used by the
    /// pull loop when a frame cannot be processed.
    pub fn terminate(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        if let Some(mut device) = inner.device.take() {
            device.release();
            info!(generation, "capture session terminated by pull loop");
        }
    }
}
