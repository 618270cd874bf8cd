use std::iter::FusedIterator;
use std::sync::Arc;

use bytes::Bytes;
use color_lock_common::color::ColorSample;
use color_lock_common::frame::Frame;
use tracing::{debug, error, info};

use crate::annotate::FrameAnnotator;
use crate::context::ColorLock;
use crate::encoder::{EncodeError, StreamEncoder};
use crate::sampler::ColorSampler;

/// The per-frame stages: sample, annotate, encode. Stateless.
#[derive(Debug, Clone, Copy)]
pub struct FramePipeline {
    pub sampler: ColorSampler,
    pub annotator: FrameAnnotator,
    pub encoder: StreamEncoder,
}

impl FramePipeline {
    pub fn new(radius: u32, quality: u8) -> Self {
        Self {
            sampler: ColorSampler::new(radius),
            annotator: FrameAnnotator::new(radius),
            encoder: StreamEncoder::new(quality),
        }
    }

    pub fn sample(&self, frame: &Frame) -> ColorSample {
        self.sampler.sample(frame)
    }

    /// Annotate with `sample` and encode to JPEG.
    pub fn render(&self, frame: &Frame, sample: &ColorSample) -> Result<Vec<u8>, EncodeError> {
        let annotated = self.annotator.annotate(frame, sample);
        self.encoder.encode(&annotated)
    }
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new(ColorSampler::DEFAULT_RADIUS, 80)
    }
}

/// Lazy sequence of multipart parts pulled from the capture session.
///
/// Bound to the session generation that was running when it was created.
/// Ends, without error, as soon as that session stops, fails a read, is
/// replaced by a newer one, or a frame cannot be encoded. Restart by calling
/// [`ColorLock::frame_chunks`] again.
pub struct FrameChunks {
    ctx: Arc<ColorLock>,
    generation: u64,
    produced: u64,
    done: bool,
}

impl FrameChunks {
    pub(crate) fn new(ctx: Arc<ColorLock>) -> Self {
        let generation = ctx.session().generation();
        debug!(generation, "frame feed opened");
        Self {
            ctx,
            generation,
            produced: 0,
            done: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn finish(&mut self) {
        self.done = true;
        info!(
            generation = self.generation,
            frames = self.produced,
            "frame feed ended"
        );
    }
}

impl Iterator for FrameChunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.done {
            return None;
        }
        let Some(frame) = self.ctx.session().read_frame(self.generation) else {
            self.finish();
            return None;
        };

        let pipeline = self.ctx.pipeline();
        let sample = pipeline.sample(&frame);
        self.ctx.colors().set_current(sample);

        match pipeline.render(&frame, &sample) {
            Ok(jpeg) => {
                self.produced += 1;
                debug!(seq = frame.seq, hex = %sample.hex(), bytes = jpeg.len(), "frame encoded");
                Some(StreamEncoder::frame_part(&jpeg))
            }
            Err(e) => {
                error!(error = %e, seq = frame.seq, "failed to encode frame, ending capture session");
                self.ctx.session().terminate(self.generation);
                self.finish();
                None
            }
        }
    }
}

impl FusedIterator for FrameChunks {}
