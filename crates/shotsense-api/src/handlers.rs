//! Request handlers.

pub mod health;
pub mod predict;
pub mod stream;

pub use health::health;
pub use predict::predict;
pub use stream::video_feed;
