//! Camera acquisition with connect/fallback/dummy-frame semantics.
//!
//! The state machine guarantees `poll()` always yields a usable BGR frame:
//! a real capture when a device is connected, a synthesized placeholder
//! otherwise. Connection order is the configured network camera URL first,
//! then the local default device. One `CameraSource` per process; it is not
//! safe to poll from more than one loop without serialization.

use std::time::{Duration, Instant};

use opencv::core::{Mat, Point, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY};
use tracing::{info, warn};

use crate::error::{VisionError, VisionResult};

/// Dummy frame dimensions.
const DUMMY_WIDTH: i32 = 640;
const DUMMY_HEIGHT: i32 = 480;

/// Pacing for synthesized frames, roughly matching a 30 fps camera.
const DUMMY_FRAME_DELAY: Duration = Duration::from_millis(30);

/// Minimum spacing between reconnection attempts after a dropped device.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Camera configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Network camera stream URL, tried before the local device.
    pub network_url: Option<String>,
    /// Local capture device index.
    pub device_index: i32,
    /// Spacing between reconnection attempts.
    pub reconnect_interval: Duration,
}

impl CameraConfig {
    /// Build a config from the optional IP-camera address parts.
    pub fn new(ip: Option<&str>, port: Option<&str>) -> Self {
        let network_url = match (ip, port) {
            (Some(ip), Some(port)) if !ip.is_empty() && !port.is_empty() => {
                Some(format!("http://{ip}:{port}/video"))
            }
            _ => None,
        };
        Self {
            network_url,
            device_index: 0,
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }
}

/// A readable frame stream, the seam between the state machine and the
/// capture backend.
pub trait FrameStream {
    /// Read one BGR frame; a failed or empty read is a capture error.
    fn read_frame(&mut self) -> VisionResult<Mat>;
}

impl FrameStream for VideoCapture {
    fn read_frame(&mut self) -> VisionResult<Mat> {
        let mut frame = Mat::default();
        let ok = self
            .read(&mut frame)
            .map_err(|e| VisionError::capture(format!("camera read failed: {e}")))?;
        if !ok || frame.empty() {
            return Err(VisionError::capture("camera returned no frame"));
        }
        Ok(frame)
    }
}

/// Opens capture streams. Abstracted so the state machine can be exercised
/// without real hardware.
pub trait CameraBackend {
    type Stream: FrameStream;

    fn open_network(&mut self, url: &str) -> Option<Self::Stream>;
    fn open_device(&mut self, index: i32) -> Option<Self::Stream>;
}

/// OpenCV-backed camera access.
pub struct OpencvBackend;

impl CameraBackend for OpencvBackend {
    type Stream = VideoCapture;

    fn open_network(&mut self, url: &str) -> Option<VideoCapture> {
        let cap = VideoCapture::from_file(url, CAP_ANY).ok()?;
        cap.is_opened().unwrap_or(false).then_some(cap)
    }

    fn open_device(&mut self, index: i32) -> Option<VideoCapture> {
        let cap = VideoCapture::new(index, CAP_ANY).ok()?;
        cap.is_opened().unwrap_or(false).then_some(cap)
    }
}

enum CameraState<S> {
    Disconnected,
    Connected(S),
    /// Terminal: no device could be opened at all; every poll synthesizes
    /// a placeholder frame.
    Dummy,
}

/// The camera source state machine.
pub struct CameraSource<B: CameraBackend = OpencvBackend> {
    backend: B,
    config: CameraConfig,
    state: CameraState<B::Stream>,
    last_attempt: Option<Instant>,
}

impl CameraSource<OpencvBackend> {
    /// Open the camera, falling back network -> local device -> dummy mode.
    pub fn connect(config: CameraConfig) -> Self {
        Self::connect_with(OpencvBackend, config)
    }
}

impl<B: CameraBackend> CameraSource<B> {
    /// Open the camera through a specific backend.
    pub fn connect_with(backend: B, config: CameraConfig) -> Self {
        let mut source = Self {
            backend,
            config,
            state: CameraState::Disconnected,
            last_attempt: None,
        };
        match source.try_open() {
            Some(stream) => {
                info!("camera connected");
                source.state = CameraState::Connected(stream);
            }
            None => {
                warn!("could not open any camera, starting in dummy mode");
                source.state = CameraState::Dummy;
            }
        }
        source
    }

    /// Whether the source is in terminal dummy mode.
    pub fn is_dummy(&self) -> bool {
        matches!(self.state, CameraState::Dummy)
    }

    /// Produce the next frame. Never fails: a capture problem yields a
    /// placeholder frame and the machine recovers on later polls.
    pub fn poll(&mut self) -> Mat {
        match &mut self.state {
            CameraState::Dummy => {
                std::thread::sleep(DUMMY_FRAME_DELAY);
                dummy_frame()
            }
            CameraState::Connected(stream) => match stream.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "camera read failed, reconnecting");
                    self.state = CameraState::Disconnected;
                    // Retry immediately on the next poll.
                    self.last_attempt = None;
                    dummy_frame()
                }
            },
            CameraState::Disconnected => {
                if !self.reconnect_due() {
                    std::thread::sleep(DUMMY_FRAME_DELAY);
                    return dummy_frame();
                }
                match self.try_open() {
                    Some(mut stream) => match stream.read_frame() {
                        Ok(frame) => {
                            info!("camera reconnected");
                            self.state = CameraState::Connected(stream);
                            frame
                        }
                        Err(_) => dummy_frame(),
                    },
                    None => dummy_frame(),
                }
            }
        }
    }

    fn reconnect_due(&self) -> bool {
        match self.last_attempt {
            None => true,
            Some(at) => at.elapsed() >= self.config.reconnect_interval,
        }
    }

    fn try_open(&mut self) -> Option<B::Stream> {
        self.last_attempt = Some(Instant::now());

        if let Some(url) = self.config.network_url.clone() {
            info!(%url, "trying network camera");
            if let Some(stream) = self.backend.open_network(&url) {
                return Some(stream);
            }
            warn!(%url, "network camera unavailable, trying local device");
        }
        self.backend.open_device(self.config.device_index)
    }
}

/// Synthesize the placeholder frame shown while no camera is available.
pub fn dummy_frame() -> Mat {
    let mut frame =
        Mat::new_rows_cols_with_default(DUMMY_HEIGHT, DUMMY_WIDTH, CV_8UC3, Scalar::all(0.0))
            .unwrap_or_default();

    let red = Scalar::new(0.0, 0.0, 255.0, 0.0);
    let _ = imgproc::put_text(
        &mut frame,
        "Camera Not Found",
        Point::new(200, 240),
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        red,
        2,
        imgproc::LINE_AA,
        false,
    );
    let _ = imgproc::put_text(
        &mut frame,
        "Check connection",
        Point::new(220, 280),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        red,
        1,
        imgproc::LINE_AA,
        false,
    );

    frame
}
