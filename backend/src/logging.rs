use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
    /// Single-line output, handy under a process supervisor
    pub compact: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            loki_enabled: std::env::var("LOKI_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            loki_url: std::env::var("LOKI_URL").ok(),
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "pulse-backend".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,pulse_backend=debug".to_string()),
            compact: std::env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("compact"))
                .unwrap_or(false),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err("LOKI_ENABLED is true but LOKI_URL is not set".to_string());
        }
        if self.service_name.trim().is_empty() {
            return Err("SERVICE_NAME must not be empty".to_string());
        }
        Ok(())
    }

    fn filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    #[cfg(feature = "loki")]
    {
        if config.loki_enabled {
            if let Some(loki_url) = config.loki_url.clone() {
                init_with_loki(&config, &loki_url)?;
                tracing::info!("📊 Logging to console and Loki at {}", loki_url);
                return Ok(());
            }
        }
    }

    init_console_only(&config)?;
    tracing::info!("📊 Console logging initialized ({})", config.environment);
    Ok(())
}

fn init_console_only(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = tracing_subscriber::registry().with(config.filter());
    if config.compact {
        registry.with(tracing_subscriber::fmt::layer().compact()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

#[cfg(feature = "loki")]
fn init_with_loki(config: &LoggingConfig, loki_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(loki_url)?;

    let (loki_layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .build_url(url)?;

    // Background task that ships batches to Loki
    tokio::spawn(task);

    tracing_subscriber::registry()
        .with(config.filter())
        .with(tracing_subscriber::fmt::layer())
        .with(loki_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoggingConfig {
        LoggingConfig {
            loki_enabled: false,
            loki_url: None,
            service_name: "pulse-backend".to_string(),
            environment: "test".to_string(),
            log_level: "info".to_string(),
            compact: true,
        }
    }

    #[test]
    fn test_loki_requires_url() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());

        cfg.loki_enabled = true;
        assert!(cfg.validate().is_err());

        cfg.loki_url = Some("http://localhost:3100".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_filter_falls_back() {
        let mut cfg = config();
        cfg.log_level = "pulse_backend=loud".to_string();
        assert_eq!(cfg.filter().to_string(), "info");

        cfg.log_level = "warn,pulse_backend=debug".to_string();
        let filter = cfg.filter().to_string();
        assert!(filter.contains("pulse_backend=debug"));
    }
}
