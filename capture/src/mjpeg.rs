use std::io::{Cursor, Read};
use std::time::Duration;

use bytes::BytesMut;
use chrono::Utc;
use color_lock_common::frame::Frame;
use image::ImageReader;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use crate::backend::{next_seq, CaptureBackend, CaptureDevice};
use crate::CaptureError;

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 64 * 1024;

/// Network camera backend: device index `i` is the MJPEG stream at `urls[i]`.
pub struct MjpegBackend {
    urls: Vec<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl MjpegBackend {
    pub fn new(urls: Vec<String>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            urls,
            connect_timeout,
            read_timeout,
        }
    }
}

impl CaptureBackend for MjpegBackend {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let url = self
            .urls
            .get(index as usize)
            .ok_or_else(|| CaptureError::Open {
                index,
                reason: "no stream URL configured".into(),
            })?;

        // The blocking client applies `timeout` to each wait on the response,
        // including every body read, so a stalled camera fails the read
        // instead of holding the session forever.
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .build()?;
        let response = client.get(url).send()?;
        if !response.status().is_success() {
            return Err(CaptureError::HttpStatus(response.status().as_u16()));
        }

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());

        info!(url, index, boundary, status = %response.status(), "connected to MJPEG stream");

        Ok(Box::new(MjpegDevice {
            response: Some(response),
            parser: MultipartParser::new(&boundary),
        }))
    }

    fn name(&self) -> &str {
        "mjpeg"
    }
}

pub struct MjpegDevice {
    response: Option<Response>,
    parser: MultipartParser,
}

impl CaptureDevice for MjpegDevice {
    fn is_opened(&self) -> bool {
        self.response.is_some()
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(jpeg) = self.parser.next_part() {
                return decode_jpeg(&jpeg);
            }
            let response = self
                .response
                .as_mut()
                .ok_or_else(|| CaptureError::Read("stream released".into()))?;
            let n = response
                .read(&mut chunk)
                .map_err(|e| CaptureError::Read(e.to_string()))?;
            if n == 0 {
                return Err(CaptureError::Read("MJPEG stream ended".into()));
            }
            self.parser.push(&chunk[..n]);
        }
    }

    fn release(&mut self) {
        if self.response.take().is_some() {
            debug!("MJPEG stream connection closed");
        }
    }
}

fn decode_jpeg(jpeg: &[u8]) -> Result<Frame, CaptureError> {
    let img = ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()
        .map_err(|e| CaptureError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CaptureError::Decode(e.to_string()))?;
    Ok(Frame::new(
        img.to_rgb8(),
        Utc::now().timestamp_millis(),
        next_seq(),
    )?)
}

/// Extract the `boundary=` parameter of a `multipart/x-mixed-replace` content type.
fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let value = param.trim().strip_prefix("boundary=")?;
        let value = value.trim_matches('"').trim_start_matches("--");
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Parse state for the MJPEG multipart stream.
#[derive(Debug, PartialEq, Eq)]
enum ParseState {
    /// Looking for the boundary marker `--<boundary>\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for a `multipart/x-mixed-replace` body. Bytes are
/// pushed as they arrive; complete parts are pulled out one at a time.
struct MultipartParser {
    boundary: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    /// Offset from which to resume scanning for the closing boundary.
    scan_from: usize,
}

impl MultipartParser {
    fn new(boundary: &str) -> Self {
        Self {
            boundary: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            scan_from: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    fn next_part(&mut self) -> Option<Vec<u8>> {
        let blen = self.boundary.len();
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.boundary) {
                        let _ = self.buffer.split_to(pos + blen);
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep a tail in case the boundary spans chunks
                        if self.buffer.len() > blen {
                            let _ = self.buffer.split_to(self.buffer.len() - blen);
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    let pos = find_subsequence(&self.buffer, HEADER_END)?;
                    let _ = self.buffer.split_to(pos + HEADER_END.len());
                    self.scan_from = 0;
                    self.state = ParseState::CollectingJpeg;
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.scan_from..], &self.boundary)
                    else {
                        self.scan_from = self.buffer.len().saturating_sub(blen);
                        return None;
                    };
                    let jpeg_end = self.scan_from + pos;
                    // Strip trailing \r\n before boundary
                    let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + blen);
                    self.state = ParseState::SeekingHeaderEnd;
                    if !jpeg.is_empty() {
                        return Some(jpeg);
                    }
                }
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::DeviceLocator;
    use crate::session::{CaptureSession, SessionState};
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::time::Instant;

    const MULTIPART_HEADERS: &str = "HTTP/1.1 200 OK\r\n\
        Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
        Connection: close\r\n\r\n";

    /// Serve `response` to a single loopback client, then keep the
    /// connection open for `hold` before closing it.
    fn serve_once(response: Vec<u8>, hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while find_subsequence(&request, HEADER_END).is_none() {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(&response);
            let _ = stream.flush();
            std::thread::sleep(hold);
        });
        format!("http://{addr}/stream")
    }

    fn jpeg(rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 8, Rgb(rgb));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 95)
            .encode_image(&img)
            .unwrap();
        out
    }

    fn multipart_body(frames: &[[u8; 3]]) -> Vec<u8> {
        let mut body = MULTIPART_HEADERS.as_bytes().to_vec();
        for rgb in frames {
            body.extend(part(&jpeg(*rgb)));
        }
        body.extend_from_slice(b"--frame\r\n");
        body
    }

    fn backend(urls: Vec<String>, read_timeout: Duration) -> MjpegBackend {
        MjpegBackend::new(urls, Duration::from_secs(2), read_timeout)
    }

    fn part(body: &[u8]) -> Vec<u8> {
        let mut out = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn splits_consecutive_parts() {
        let mut parser = MultipartParser::new("frame");
        let mut stream = part(b"first");
        stream.extend(part(b"second"));
        stream.extend(part(b"third"));
        parser.push(&stream);

        assert_eq!(parser.next_part().unwrap(), b"first");
        assert_eq!(parser.next_part().unwrap(), b"second");
        // The last part has no closing boundary yet.
        assert!(parser.next_part().is_none());
        parser.push(b"--frame\r\n");
        assert_eq!(parser.next_part().unwrap(), b"third");
    }

    #[test]
    fn handles_byte_at_a_time_delivery() {
        let mut parser = MultipartParser::new("frame");
        let mut stream = part(b"abc");
        stream.extend(part(b"def"));
        let mut parts = Vec::new();
        for byte in stream {
            parser.push(&[byte]);
            while let Some(p) = parser.next_part() {
                parts.push(p);
            }
        }
        assert_eq!(parts, vec![b"abc".to_vec()]);
    }

    #[test]
    fn skips_preamble_before_first_boundary() {
        let mut parser = MultipartParser::new("frame");
        parser.push(b"garbage garbage");
        parser.push(&part(b"x"));
        parser.push(b"--frame\r\n");
        assert_eq!(parser.next_part().unwrap(), b"x");
    }

    #[test]
    fn custom_boundary() {
        let mut parser = MultipartParser::new("myboundary");
        parser.push(b"--myboundary\r\nContent-Type: image/jpeg\r\nContent-Length: 3\r\n\r\nabc\r\n--myboundary\r\n");
        assert_eq!(parser.next_part().unwrap(), b"abc");
    }

    #[test]
    fn boundary_parsed_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace; boundary=frame").as_deref(),
            Some("frame")
        );
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace;boundary=\"--cam\"").as_deref(),
            Some("cam")
        );
        assert!(boundary_from_content_type("image/jpeg").is_none());
    }

    #[test]
    fn decodes_jpeg_into_rgb_frame() {
        let img = RgbImage::from_pixel(16, 8, Rgb([0, 0, 255]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 95)
            .encode_image(&img)
            .unwrap();

        let frame = decode_jpeg(&jpeg).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
        let [r, g, b] = frame.image().get_pixel(8, 4).0;
        assert!(r < 10 && g < 10 && b > 240);
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decode_jpeg(b"not a jpeg"),
            Err(CaptureError::Decode(_))
        ));
    }

    #[test]
    fn open_without_url_fails() {
        let backend =
            MjpegBackend::new(Vec::new(), Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(
            backend.open(0),
            Err(CaptureError::Open { index: 0, .. })
        ));
    }

    #[test]
    fn non_success_status_is_rejected() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
            Duration::ZERO,
        );
        let backend = backend(vec![url], Duration::from_secs(2));
        assert!(matches!(backend.open(0), Err(CaptureError::HttpStatus(404))));
    }

    #[test]
    fn locator_skips_a_missing_stream() {
        let missing = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
            Duration::ZERO,
        );
        let live = serve_once(multipart_body(&[[0, 0, 255]]), Duration::ZERO);
        let locator = DeviceLocator::new(
            Arc::new(backend(vec![missing, live], Duration::from_secs(2))),
            2,
        );

        let mut device = locator.locate().unwrap();
        let [r, g, b] = device.read().unwrap().image().get_pixel(8, 4).0;
        assert!(r < 10 && g < 10 && b > 240);
    }

    #[test]
    fn reads_each_part_of_a_live_stream() {
        let url = serve_once(
            multipart_body(&[[255, 0, 0], [0, 255, 0]]),
            Duration::ZERO,
        );
        let mut device = backend(vec![url], Duration::from_secs(2)).open(0).unwrap();
        assert!(device.is_opened());

        let first = device.read().unwrap();
        let second = device.read().unwrap();
        assert_eq!((first.width(), first.height()), (16, 8));
        assert!(first.image().get_pixel(8, 4).0[0] > 240);
        assert!(second.image().get_pixel(8, 4).0[1] > 240);
        assert!(second.seq > first.seq);

        // Server closed the connection after the last part.
        assert!(matches!(device.read(), Err(CaptureError::Read(_))));
        device.release();
        assert!(!device.is_opened());
    }

    #[test]
    fn stalled_stream_fails_the_read() {
        let url = serve_once(
            MULTIPART_HEADERS.as_bytes().to_vec(),
            Duration::from_secs(10),
        );
        let mut device = backend(vec![url], Duration::from_millis(300)).open(0).unwrap();

        let started = Instant::now();
        assert!(matches!(device.read(), Err(CaptureError::Read(_))));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn stalled_stream_does_not_pin_the_session() {
        let url = serve_once(
            MULTIPART_HEADERS.as_bytes().to_vec(),
            Duration::from_secs(10),
        );
        let session = Arc::new(CaptureSession::new(DeviceLocator::new(
            Arc::new(backend(vec![url], Duration::from_millis(300))),
            1,
        )));
        let generation = session.start().unwrap();

        let reader = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.read_frame(generation))
        };
        std::thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        // Blocks behind the in-flight read until the read times out.
        session.stop();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(reader.join().unwrap().is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
