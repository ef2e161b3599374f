//! Upload-and-classify endpoint.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::info;

use shotsense_models::{Mode, PredictResponse};
use shotsense_vision::{FramePipeline, VisionError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /predict`: multipart form with an image `file` field and an
/// optional `mode` field (default `detect`).
///
/// Undecodable images are a client error (400). A requested-but-unloaded
/// model is not an error status: the response carries an explanatory
/// message with empty data so callers can treat the feature as disabled.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PredictResponse>> {
    let mut file_bytes = None;
    let mut mode = Mode::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                file_bytes = Some(field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("failed to read file field: {e}"))
                })?);
            }
            Some("mode") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read mode field: {e}")))?;
                mode = Mode::parse_or_default(&text);
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::bad_request("missing file field"))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid image file: {e}")))?;

    info!(
        width = img.width(),
        height = img.height(),
        %mode,
        "received image for inference"
    );

    // Inference is CPU-bound; keep it off the async workers.
    let registry = Arc::clone(&state.registry);
    let result = tokio::task::spawn_blocking(move || {
        FramePipeline::new(registry).process(&img, mode)
    })
    .await
    .map_err(|e| ApiError::internal(format!("inference task failed: {e}")))?;

    match result {
        Ok(items) => Ok(Json(PredictResponse::success(items))),
        Err(VisionError::ModelUnavailable(kind)) => Ok(Json(PredictResponse::empty(format!(
            "{kind} is not active on server"
        )))),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}
