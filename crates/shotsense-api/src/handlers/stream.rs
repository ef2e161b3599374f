//! MJPEG live stream endpoint.

use axum::body::Bytes;

/// Wraps one JPEG frame in the multipart/x-mixed-replace part framing
/// browsers expect for motion JPEG.
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut part =
        Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

#[cfg(feature = "opencv")]
mod live {
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::header;
    use axum::response::Response;
    use futures_util::StreamExt;
    use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
    use tokio_stream::wrappers::BroadcastStream;
    use tracing::debug;

    use crate::error::{ApiError, ApiResult};
    use crate::state::AppState;

    use super::mjpeg_part;

    /// `GET /video_feed`: an unbounded multipart/x-mixed-replace stream of
    /// annotated JPEG frames. Slow clients that fall behind the broadcast
    /// backlog skip frames rather than stalling the feed.
    pub async fn video_feed(State(state): State<AppState>) -> ApiResult<Response> {
        let feed = state
            .frames
            .as_ref()
            .ok_or_else(|| ApiError::service_unavailable("live stream is not enabled"))?;

        let frames = BroadcastStream::new(feed.subscribe()).filter_map(|frame| async move {
            match frame {
                Ok(jpeg) => Some(Ok::<_, std::convert::Infallible>(mjpeg_part(&jpeg))),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!(skipped, "stream client lagged, dropping frames");
                    None
                }
            }
        });

        Response::builder()
            .header(
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=frame",
            )
            .body(Body::from_stream(frames))
            .map_err(|e| ApiError::internal(format!("failed to build stream response: {e}")))
    }
}

#[cfg(feature = "opencv")]
pub use live::video_feed;

#[cfg(not(feature = "opencv"))]
mod stub {
    use axum::extract::State;
    use axum::response::Response;

    use crate::error::{ApiError, ApiResult};
    use crate::state::AppState;

    /// Camera support is compiled out; the endpoint reports unavailable.
    pub async fn video_feed(State(_state): State<AppState>) -> ApiResult<Response> {
        Err(ApiError::service_unavailable(
            "live stream is not available in this build",
        ))
    }
}

#[cfg(not(feature = "opencv"))]
pub use stub::video_feed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpeg_part_frames_jpeg_bytes() {
        let part = mjpeg_part(&[0xff, 0xd8, 0xff]);
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(part.ends_with(b"\xff\xd8\xff\r\n"));
    }

    #[test]
    fn mjpeg_part_handles_empty_frame() {
        let part = mjpeg_part(&[]);
        assert_eq!(
            part.as_ref(),
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\r\n"
        );
    }
}
