use std::sync::atomic::{AtomicU64, Ordering};

use color_lock_common::frame::Frame;

use crate::CaptureError;

static SEQ_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Next frame sequence number, shared by every device in the process.
pub(crate) fn next_seq() -> u64 {
    SEQ_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A platform capture backend: knows how to turn a device index into an
/// open device handle.
///
/// Swapping the backend (network camera, V4L, a scripted fake in tests) never
/// touches the locator or the session.
pub trait CaptureBackend: Send + Sync {
    /// Try to open device `index`. A returned device may still report
    /// `is_opened() == false`, in which case the caller must release it.
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// An open device handle. Owned exclusively by the capture session.
pub trait CaptureDevice: Send {
    fn is_opened(&self) -> bool;

    /// Block until the next frame is available. Bounded by the device's own
    /// timeout.
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Release the underlying device. Must be safe to call more than once.
    fn release(&mut self);
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    //! Scripted in-memory backend for exercising the locator, the session
    //! and everything built on top of them without hardware.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use color_lock_common::frame::Frame;

    use super::{CaptureBackend, CaptureDevice};
    use crate::CaptureError;

    /// Counters shared between a [`ScriptedBackend`] and every device it hands out.
    #[derive(Debug, Default)]
    pub struct DeviceStats {
        pub opens: AtomicUsize,
        pub releases: AtomicUsize,
        pub reads: AtomicUsize,
    }

    impl DeviceStats {
        pub fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
        pub fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    /// Backend whose devices exist only at `working` indices. Devices yield
    /// solid frames of `color` and fail on read number `fail_on_read`
    /// (1-based) when set.
    pub struct ScriptedBackend {
        working: HashSet<u32>,
        color: [u8; 3],
        size: (u32, u32),
        fail_on_read: Option<usize>,
        pub stats: Arc<DeviceStats>,
        pub opened_indices: Mutex<Vec<u32>>,
    }

    impl ScriptedBackend {
        pub fn new(working: impl IntoIterator<Item = u32>) -> Self {
            Self {
                working: working.into_iter().collect(),
                color: [255, 0, 0],
                size: (160, 120),
                fail_on_read: None,
                stats: Arc::new(DeviceStats::default()),
                opened_indices: Mutex::new(Vec::new()),
            }
        }

        pub fn with_color(mut self, rgb: [u8; 3]) -> Self {
            self.color = rgb;
            self
        }

        pub fn with_size(mut self, width: u32, height: u32) -> Self {
            self.size = (width, height);
            self
        }

        pub fn failing_on_read(mut self, n: usize) -> Self {
            self.fail_on_read = Some(n);
            self
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError> {
            self.opened_indices.lock().unwrap().push(index);
            self.stats.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedDevice {
                opened: self.working.contains(&index),
                released: false,
                color: self.color,
                size: self.size,
                fail_on_read: self.fail_on_read,
                reads: 0,
                stats: Arc::clone(&self.stats),
            }))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub struct ScriptedDevice {
        opened: bool,
        released: bool,
        color: [u8; 3],
        size: (u32, u32),
        fail_on_read: Option<usize>,
        reads: usize,
        stats: Arc<DeviceStats>,
    }

    impl CaptureDevice for ScriptedDevice {
        fn is_opened(&self) -> bool {
            self.opened && !self.released
        }

        fn read(&mut self) -> Result<Frame, CaptureError> {
            self.reads += 1;
            self.stats.reads.fetch_add(1, Ordering::SeqCst);
            if self.released {
                return Err(CaptureError::Read("device already released".into()));
            }
            if self.fail_on_read == Some(self.reads) {
                return Err(CaptureError::Read(format!("scripted failure on read {}", self.reads)));
            }
            Ok(Frame::solid(self.size.0, self.size.1, self.color)?)
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.stats.releases.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}
