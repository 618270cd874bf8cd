use bytes::{BufMut, Bytes, BytesMut};
use color_lock_common::frame::Frame;
use image::codecs::jpeg::JpegEncoder;

/// Multipart boundary token used between parts of the live feed.
pub const BOUNDARY: &str = "frame";
/// Media type of the live feed response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
/// Media type of each part.
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Serializes annotated frames to JPEG and wraps them as multipart parts.
#[derive(Debug, Clone, Copy)]
pub struct StreamEncoder {
    quality: u8,
}

impl StreamEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(64 * 1024);
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(frame.image())?;
        Ok(buf)
    }

    /// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`
    pub fn frame_part(jpeg: &[u8]) -> Bytes {
        let header = format!("--{BOUNDARY}\r\nContent-Type: {PART_CONTENT_TYPE}\r\n\r\n");
        let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
        part.put_slice(header.as_bytes());
        part.put_slice(jpeg);
        part.put_slice(b"\r\n");
        part.freeze()
    }
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}
