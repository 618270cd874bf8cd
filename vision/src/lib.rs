pub mod annotate;
pub mod context;
pub mod encoder;
pub mod feed;
pub mod sampler;

pub use annotate::FrameAnnotator;
pub use context::ColorLock;
pub use encoder::{EncodeError, StreamEncoder};
pub use feed::{FrameChunks, FramePipeline};
pub use sampler::ColorSampler;
