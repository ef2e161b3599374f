//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shotsense_api::{create_router, ApiConfig, AppState};
use shotsense_vision::{ModelPaths, ModelRegistry};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production.
    // Both write to stderr.
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("shotsense=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting shotsense-api");

    // Load configuration
    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    // Load whatever models are present; missing ones leave their features
    // reporting inactive rather than aborting startup.
    let registry = Arc::new(ModelRegistry::load(&ModelPaths::from_env()));

    let state = AppState::new(config.clone(), Arc::clone(&registry));

    #[cfg(feature = "opencv")]
    let state = if config.stream_enabled {
        let camera = shotsense_vision::camera::CameraConfig::new(
            config.camera_ip.as_deref(),
            config.camera_port.as_deref(),
        );
        let feed = shotsense_vision::feed::FrameFeed::spawn(
            camera,
            Arc::clone(&registry),
            config.show_landmarks,
        );
        info!("Live frame feed started");
        state.with_feed(Arc::new(feed))
    } else {
        info!("Live streaming disabled");
        state
    };

    // Create router
    let app = create_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
