//! API server configuration.

/// Server configuration, read once at startup. None of these change at
/// runtime.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server bind host.
    pub host: String,
    /// Server bind port.
    pub port: u16,
    /// CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Max request body size for uploads.
    pub max_body_size: usize,
    /// Network camera address, tried before the local device.
    pub camera_ip: Option<String>,
    /// Network camera port.
    pub camera_port: Option<String>,
    /// Draw the pose skeleton on streamed frames.
    pub show_landmarks: bool,
    /// Run the live capture loop at all.
    pub stream_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            max_body_size: 10 * 1024 * 1024, // 10MB
            camera_ip: None,
            camera_port: None,
            show_landmarks: false,
            stream_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            camera_ip: std::env::var("CAMERA_IP").ok().filter(|s| !s.is_empty()),
            camera_port: std::env::var("CAMERA_PORT").ok().filter(|s| !s.is_empty()),
            show_landmarks: env_flag("SHOW_LANDMARKS", defaults.show_landmarks),
            stream_enabled: env_flag("STREAM_ENABLED", defaults.stream_enabled),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.stream_enabled);
        assert!(!config.show_landmarks);
        assert!(config.camera_ip.is_none());
    }
}
