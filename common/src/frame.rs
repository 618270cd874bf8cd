use image::{Rgb, RgbImage};

/// Channel order of a raw pixel buffer as delivered by a capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOrder {
    Rgb,
    /// Blue, green, red. For backends that hand over raw BGR buffers; the
    /// bundled MJPEG and V4L backends decode JPEG straight to RGB.
    Bgr,
}

/// One captured image.
///
/// Pixels are always stored in (R, G, B) order regardless of the order the
/// device delivered them in; [`Frame::from_raw`] reorders on construction so
/// every downstream stage can index channels without knowing the source.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Result<Self, FrameError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FrameError::Empty);
        }
        Ok(Self {
            image,
            captured_at_ms,
            seq,
        })
    }

    /// Build a frame from a packed 3-bytes-per-pixel buffer.
    pub fn from_raw(
        width: u32,
        height: u32,
        mut data: Vec<u8>,
        order: PixelOrder,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let Some(expected) = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
        else {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected: usize::MAX,
            });
        };
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected,
            });
        }
        if order == PixelOrder::Bgr {
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
        }
        let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::BufferSize {
            got: 0,
            expected,
        })?;
        Self::new(image, captured_at_ms, seq)
    }

    /// A frame filled with a single color. Handy for tests and placeholders.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, FrameError> {
        Self::new(
            RgbImage::from_pixel(width, height, Rgb(rgb)),
            chrono::Utc::now().timestamp_millis(),
            0,
        )
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Geometric center `(width / 2, height / 2)`.
    pub fn center(&self) -> (i64, i64) {
        (i64::from(self.width() / 2), i64::from(self.height() / 2))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Replace the pixel data while keeping the capture metadata.
    pub fn with_image(&self, image: RgbImage) -> Self {
        Self {
            image,
            captured_at_ms: self.captured_at_ms,
            seq: self.seq,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
    #[error("frame has zero width or height")]
    Empty,
}
