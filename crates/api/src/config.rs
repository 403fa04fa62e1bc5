//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{PricingSource, TransitionPolicy};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory datastore
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `LOCK_TIMEOUT_MS`: row-lock wait in milliseconds, must be positive (default: `5000`)
/// - `ORDER_TRANSITIONS`: `strict` or `permissive` (default: `strict`)
/// - `PRICING_SOURCE`: `catalog` or `client` (default: `catalog`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub lock_timeout: Duration,
    pub transitions: TransitionPolicy,
    pub pricing: PricingSource,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
            lock_timeout: lookup("LOCK_TIMEOUT_MS")
                .and_then(|ms| ms.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            transitions: lookup("ORDER_TRANSITIONS")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.transitions),
            pricing: lookup("PRICING_SOURCE")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.pricing),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            max_connections: 10,
            lock_timeout: Duration::from_millis(5000),
            transitions: TransitionPolicy::Strict,
            pricing: PricingSource::Catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.transitions, TransitionPolicy::Strict);
        assert_eq!(config.pricing, PricingSource::Catalog);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_reads_every_variable() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://cafe@localhost/cafe"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("LOCK_TIMEOUT_MS", "250"),
            ("ORDER_TRANSITIONS", "permissive"),
            ("PRICING_SOURCE", "client"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8081");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://cafe@localhost/cafe")
        );
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.transitions, TransitionPolicy::Permissive);
        assert_eq!(config.pricing, PricingSource::Client);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "http"),
            ("LOG_FORMAT", "yaml"),
            ("DATABASE_URL", "  "),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("LOCK_TIMEOUT_MS", "-1"),
            ("ORDER_TRANSITIONS", "lenient"),
            ("PRICING_SOURCE", "menu"),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.transitions, TransitionPolicy::Strict);
        assert_eq!(config.pricing, PricingSource::Catalog);
    }

    #[test]
    fn test_zero_lock_timeout_falls_back() {
        let config = from_pairs(&[("LOCK_TIMEOUT_MS", "0")]);
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
    }
}
