//! Axum HTTP surface for ShotSense.
//!
//! Exposes `/predict` (multipart upload inference), `/video_feed` (live
//! MJPEG stream, builds with the `opencv` feature) and `/health`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
