//! Tracing initialization for FinSight services.
//!
//! Provides standardized tracing subscriber setup with JSON or pretty formatting.

use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for log attribution
    pub service_name: String,
    /// Environment (dev, staging, prod)
    pub environment: String,
    /// Log format: "json" or "pretty"
    pub format: String,
    /// Log level filter (e.g., "info", "txn_rag=debug,info")
    pub level: String,
    /// Whether to include file/line in logs
    pub include_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "finsight".to_string(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            include_location: env::var("LOG_LOCATION").map(|v| v == "true").unwrap_or(false),
        }
    }
}

impl TracingConfig {
    /// Create config for a specific service
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set format to JSON
    pub fn json(mut self) -> Self {
        self.format = "json".to_string();
        self
    }

    /// Set format to pretty (human-readable)
    pub fn pretty(mut self) -> Self {
        self.format = "pretty".to_string();
        self
    }
}

/// Initialize tracing with the given configuration
///
/// # Example
/// ```ignore
/// use finsight_observability::{init_tracing, TracingConfig};
///
/// init_tracing(TracingConfig::for_service("txn-rag"));
/// ```
pub fn init_tracing(config: TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.format == "json" {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(true);

        tracing_subscriber::registry().with(filter).with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(true);

        tracing_subscriber::registry().with(filter).with(layer).init();
    }

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        format = %config.format,
        "Tracing initialized"
    );
}

/// Quick initialization with defaults for a service
pub fn init_tracing_for(service_name: &str) {
    init_tracing(TracingConfig::for_service(service_name));
}
