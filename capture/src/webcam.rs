//! Local webcams through Video4Linux. Device index `i` is `/dev/video{i}`.

use std::io::Cursor;
use std::time::Duration;

use chrono::Utc;
use color_lock_common::frame::Frame;
use image::{ImageFormat, ImageReader};
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::backend::{next_seq, CaptureBackend, CaptureDevice};
use crate::CaptureError;

const BUFFER_COUNT: u32 = 4;

pub struct V4lBackend {
    width: u32,
    height: u32,
    timeout: Duration,
}

impl V4lBackend {
    pub fn new(width: u32, height: u32, timeout: Duration) -> Self {
        Self {
            width,
            height,
            timeout,
        }
    }
}

impl CaptureBackend for V4lBackend {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let open_err = |e: std::io::Error| CaptureError::Open {
            index,
            reason: e.to_string(),
        };

        let device = Device::new(index as usize).map_err(open_err)?;
        let mut format = device.format().map_err(open_err)?;
        format.width = self.width;
        format.height = self.height;
        format.fourcc = FourCC::new(b"MJPG");
        let format = device.set_format(&format).map_err(open_err)?;
        if format.fourcc != FourCC::new(b"MJPG") {
            return Err(CaptureError::Open {
                index,
                reason: format!("device does not deliver MJPG (got {})", format.fourcc),
            });
        }

        let mut stream =
            Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT).map_err(open_err)?;
        stream.set_timeout(self.timeout);

        info!(
            index,
            width = format.width,
            height = format.height,
            "V4L device streaming"
        );

        Ok(Box::new(V4lDevice {
            stream: Some(stream),
            _device: device,
        }))
    }

    fn name(&self) -> &str {
        "v4l"
    }
}

pub struct V4lDevice {
    // Dropped before the device.
    stream: Option<Stream<'static>>,
    _device: Device,
}

impl CaptureDevice for V4lDevice {
    fn is_opened(&self) -> bool {
        self.stream.is_some()
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Read("device released".into()))?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CaptureError::Read(e.to_string()))?;
        let used = (meta.bytesused as usize).min(buf.len());
        let img = ImageReader::with_format(Cursor::new(&buf[..used]), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;
        Ok(Frame::new(
            img.to_rgb8(),
            Utc::now().timestamp_millis(),
            next_seq(),
        )?)
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!("V4L stream stopped");
        }
    }
}
