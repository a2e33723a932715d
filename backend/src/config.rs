use std::net::SocketAddr;

/// Process-level settings read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_backend_url: String,
    /// Disable to run without the periodic refresh job
    pub scheduler_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000))),
            data_backend_url: std::env::var("DATA_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            scheduler_enabled: std::env::var("SCHEDULER_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }
}
