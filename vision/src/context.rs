use std::sync::Arc;

use color_lock_capture::{CaptureError, CaptureSession};
use color_lock_common::color::{ColorHistory, ColorSample, SharedColorState};
use tracing::info;

use crate::feed::{FrameChunks, FramePipeline};

/// Everything one process shares between the capture loop and its pollers.
///
/// Access rules: only [`FrameChunks`] writes the current color; any caller
/// may read it. The history is only ever appended to. The device handle
/// lives inside the session and is never exposed.
pub struct ColorLock {
    session: CaptureSession,
    colors: SharedColorState,
    history: ColorHistory,
    pipeline: FramePipeline,
}

impl ColorLock {
    pub fn new(session: CaptureSession, pipeline: FramePipeline) -> Self {
        Self {
            session,
            colors: SharedColorState::new(),
            history: ColorHistory::new(),
            pipeline,
        }
    }

    pub fn start_camera(&self) -> Result<(), CaptureError> {
        self.session.start().map(|_| ())
    }

    pub fn stop_camera(&self) {
        self.session.stop();
    }

    /// Begin a fresh pull from the capture session.
    pub fn frame_chunks(self: &Arc<Self>) -> FrameChunks {
        FrameChunks::new(Arc::clone(self))
    }

    pub fn color_data(&self) -> ColorSample {
        self.colors.get_current()
    }

    /// Append the current color, sentinel included, to the history.
    pub fn save_color(&self) -> ColorSample {
        let saved = self.history.append_history(&self.colors);
        info!(hex = %saved.hex(), total = self.history.len(), "color saved");
        saved
    }

    pub fn history(&self) -> Vec<ColorSample> {
        self.history.list_history()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub(crate) fn colors(&self) -> &SharedColorState {
        &self.colors
    }

    pub(crate) fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }
}
