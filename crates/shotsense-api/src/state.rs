//! Application state.

use std::sync::Arc;

use shotsense_vision::ModelRegistry;

use crate::config::ApiConfig;

#[cfg(feature = "opencv")]
use shotsense_vision::feed::FrameFeed;

/// Shared application state. The registry is loaded once at startup and
/// read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<ModelRegistry>,
    /// Live frame feed, present when streaming is enabled and the binary
    /// was built with camera support.
    #[cfg(feature = "opencv")]
    pub frames: Option<Arc<FrameFeed>>,
}

impl AppState {
    /// Create application state without a live feed.
    pub fn new(config: ApiConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            config,
            registry,
            #[cfg(feature = "opencv")]
            frames: None,
        }
    }

    /// Attach the live frame feed.
    #[cfg(feature = "opencv")]
    pub fn with_feed(mut self, feed: Arc<FrameFeed>) -> Self {
        self.frames = Some(feed);
        self
    }
}
