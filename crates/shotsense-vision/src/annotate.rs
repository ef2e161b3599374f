//! Frame annotation for the live stream: pose skeleton overlay and the
//! shot/confidence banner. Annotation mutates the frame buffer in place and
//! is never reflected in the returned inference items.

use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::{VisionError, VisionResult};
use crate::pose::{Landmarks, POSE_CONNECTIONS};

/// Minimum visibility for a landmark to be drawn.
const DRAW_VISIBILITY: f32 = 0.5;

/// Draw the pose skeleton onto a BGR frame.
///
/// Landmark coordinates are normalized `[0, 1]`, so they scale to whatever
/// the frame resolution is.
pub fn draw_landmarks(frame: &mut Mat, landmarks: &Landmarks) {
    let (width, height) = match frame.size() {
        Ok(size) => (size.width as f32, size.height as f32),
        Err(_) => return,
    };

    let joint_color = Scalar::new(66.0, 117.0, 245.0, 0.0);
    let bone_color = Scalar::new(230.0, 66.0, 245.0, 0.0);

    let pixel = |idx: usize| -> Option<Point> {
        let lm = landmarks.points.get(idx)?;
        (lm.visibility >= DRAW_VISIBILITY).then(|| {
            Point::new(
                (lm.x * width).round() as i32,
                (lm.y * height).round() as i32,
            )
        })
    };

    for &(a, b) in POSE_CONNECTIONS {
        if let (Some(pa), Some(pb)) = (pixel(a), pixel(b)) {
            let _ = imgproc::line(frame, pa, pb, bone_color, 2, imgproc::LINE_8, 0);
        }
    }

    for idx in 0..landmarks.points.len() {
        if let Some(p) = pixel(idx) {
            let _ = imgproc::circle(frame, p, 2, joint_color, imgproc::FILLED, imgproc::LINE_8, 0);
        }
    }
}

/// Draw the shot label/confidence banner in the top-left corner.
pub fn draw_banner(frame: &mut Mat, label: &str, confidence: f32) {
    let banner_color = Scalar::new(16.0, 117.0, 245.0, 0.0);
    let text_color = Scalar::new(255.0, 255.0, 255.0, 0.0);

    let _ = imgproc::rectangle(
        frame,
        Rect::new(0, 0, 300, 60),
        banner_color,
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    );
    let _ = imgproc::put_text(
        frame,
        &format!("Shot: {label}"),
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        text_color,
        2,
        imgproc::LINE_AA,
        false,
    );
    let _ = imgproc::put_text(
        frame,
        &format!("Conf: {:.1}%", confidence * 100.0),
        Point::new(10, 55),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        text_color,
        1,
        imgproc::LINE_AA,
        false,
    );
}

/// Convert a BGR Mat into a `DynamicImage` for the still-image pipeline.
pub fn mat_to_image(frame: &Mat) -> VisionResult<DynamicImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| VisionError::capture(format!("BGR to RGB conversion failed: {e}")))?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb
        .data_bytes()
        .map_err(|e| VisionError::capture(format!("failed to access frame data: {e}")))?;

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, data.to_vec())
            .ok_or_else(|| VisionError::capture("frame buffer has unexpected length"))?;

    Ok(DynamicImage::ImageRgb8(buffer))
}
