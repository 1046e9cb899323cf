//! API configuration.

/// API server configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Shared secret required by the pipeline routes; empty rejects all calls
    pub trigger_secret: String,
    /// Global rate limit of the pipeline routes
    pub trigger_rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Whether `/metrics` is served
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("trigger_secret", &if self.trigger_secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("trigger_rate_limit_rps", &self.trigger_rate_limit_rps)
            .field("max_body_size", &self.max_body_size)
            .field("environment", &self.environment)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            trigger_secret: String::new(),
            trigger_rate_limit_rps: 2,
            max_body_size: 64 * 1024, // 64KB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            trigger_secret: std::env::var("PIPELINE_TRIGGER_SECRET")
                .or_else(|_| std::env::var("CRON_SECRET"))
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            trigger_rate_limit_rps: std::env::var("TRIGGER_RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.trigger_rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
