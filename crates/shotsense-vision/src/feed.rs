//! Live frame feed: one capture thread driving camera -> pipeline ->
//! annotate -> JPEG, publishing encoded frames to any number of stream
//! subscribers.
//!
//! Exactly one thread owns the `CameraSource`; HTTP clients each get an
//! independent broadcast subscription, so a slow client lags (and skips
//! frames) without stalling the capture loop or other clients.

use std::sync::Arc;

use opencv::core::Vector;
use opencv::imgcodecs;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use shotsense_models::DetectionItem;

use crate::annotate;
use crate::camera::{CameraConfig, CameraSource};
use crate::error::VisionError;
use crate::pipeline::FramePipeline;
use crate::registry::ModelRegistry;

/// Encoded frames a lagging subscriber may fall behind before skipping.
const FRAME_BACKLOG: usize = 8;

/// Handle to the background capture loop.
pub struct FrameFeed {
    tx: broadcast::Sender<Vec<u8>>,
}

impl FrameFeed {
    /// Start the capture thread.
    ///
    /// `show_landmarks` toggles the skeleton overlay; the shot banner is
    /// drawn whenever a classification is produced.
    pub fn spawn(
        camera: CameraConfig,
        registry: Arc<ModelRegistry>,
        show_landmarks: bool,
    ) -> Self {
        let (tx, _) = broadcast::channel(FRAME_BACKLOG);
        let sender = tx.clone();
        std::thread::spawn(move || capture_loop(camera, registry, show_landmarks, sender));
        Self { tx }
    }

    /// Subscribe to JPEG-encoded frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }
}

fn capture_loop(
    camera: CameraConfig,
    registry: Arc<ModelRegistry>,
    show_landmarks: bool,
    sender: broadcast::Sender<Vec<u8>>,
) {
    let mut source = CameraSource::connect(camera);
    let pipeline = FramePipeline::new(registry);
    let mut unavailable_logged = false;

    loop {
        let mut frame = source.poll();

        // Nobody watching: keep the camera state machine warm but skip
        // inference and encoding.
        if sender.receiver_count() == 0 {
            continue;
        }

        if !source.is_dummy() {
            annotate_frame(
                &pipeline,
                &mut frame,
                show_landmarks,
                &mut unavailable_logged,
            );
        }

        let mut encoded = Vector::<u8>::new();
        match imgcodecs::imencode(".jpg", &frame, &mut encoded, &Vector::new()) {
            Ok(true) => {
                // Send fails only when every receiver is gone; fine.
                let _ = sender.send(encoded.to_vec());
            }
            Ok(false) => debug!("JPEG encoding produced no data, skipping frame"),
            Err(e) => debug!(error = %e, "JPEG encoding failed, skipping frame"),
        }
    }
}

/// Run pose inference and burn annotations into the frame. Inference
/// problems never interrupt the stream; the raw frame is still published.
fn annotate_frame(
    pipeline: &FramePipeline,
    frame: &mut opencv::core::Mat,
    show_landmarks: bool,
    unavailable_logged: &mut bool,
) {
    let image = match annotate::mat_to_image(frame) {
        Ok(image) => image,
        Err(e) => {
            debug!(error = %e, "frame conversion failed");
            return;
        }
    };

    match pipeline.analyze_pose(&image) {
        Ok(analysis) => {
            if let Some(landmarks) = &analysis.landmarks {
                if show_landmarks {
                    annotate::draw_landmarks(frame, landmarks);
                }
            }
            if let Some(DetectionItem::Classification {
                class_name, conf, ..
            }) = analysis.items.first()
            {
                annotate::draw_banner(frame, class_name, *conf);
            }
        }
        Err(VisionError::ModelUnavailable(kind)) => {
            if !*unavailable_logged {
                warn!(model = %kind, "streaming without inference: model not loaded");
                *unavailable_logged = true;
            }
        }
        Err(e) => debug!(error = %e, "pose analysis failed for frame"),
    }
}
