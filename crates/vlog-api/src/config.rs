//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size; uploads count against it
    pub max_body_size: usize,
    /// Environment (local/development/production)
    pub environment: String,
    /// Expose Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Delay between status feed snapshots
    pub feed_interval: Duration,
    /// Keep records and objects in process instead of Firestore and R2
    pub memory_backends: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 100 * 1024 * 1024,
            environment: "development".to_string(),
            metrics_enabled: true,
            feed_interval: Duration::from_secs(2),
            memory_backends: false,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let local = environment.eq_ignore_ascii_case("local");

        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            feed_interval: Duration::from_millis(
                std::env::var("FEED_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            memory_backends: std::env::var("MEMORY_BACKENDS")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(local),
            environment,
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for key in [
            "ENVIRONMENT",
            "API_PORT",
            "CORS_ORIGINS",
            "MEMORY_BACKENDS",
            "FEED_INTERVAL_MS",
            "METRICS_ENABLED",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert!(!config.memory_backends);
        assert!(config.metrics_enabled);
        assert_eq!(config.feed_interval, Duration::from_secs(2));
    }

    #[test]
    #[serial]
    fn test_local_environment_uses_memory_backends() {
        clear();
        std::env::set_var("ENVIRONMENT", "local");
        std::env::set_var("CORS_ORIGINS", "http://a.test, http://b.test,");
        let config = ApiConfig::from_env();
        assert!(config.memory_backends);
        assert!(!config.is_production());
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);

        std::env::set_var("MEMORY_BACKENDS", "false");
        assert!(!ApiConfig::from_env().memory_backends);
        clear();
    }
}
