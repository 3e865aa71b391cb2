//! Application configuration loaded from environment variables.

use commerce::StripeClient;
use commerce::webhook::DEFAULT_TOLERANCE_SECS;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_API_BASE`
/// - `CHECKOUT_SUCCESS_URL`, `CHECKOUT_CANCEL_URL`, `CURRENCY` (default: `usd`)
/// - `WEBHOOK_TOLERANCE_SECS`: signature age limit (default: `300`)
/// - `MJ_APIKEY_PUBLIC`, `MJ_APIKEY_PRIVATE`, `DEFAULT_FROM_EMAIL`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
    pub mailjet_api_key: Option<String>,
    pub mailjet_api_secret: Option<String>,
    pub default_from_email: String,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL"),
            database_max_connections: parsed(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: var("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            checkout_success_url: var("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: var("CHECKOUT_CANCEL_URL").unwrap_or(defaults.checkout_cancel_url),
            currency: var("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            webhook_tolerance_secs: parsed(
                "WEBHOOK_TOLERANCE_SECS",
                defaults.webhook_tolerance_secs,
            ),
            mailjet_api_key: var("MJ_APIKEY_PUBLIC"),
            mailjet_api_secret: var("MJ_APIKEY_PRIVATE"),
            default_from_email: var("DEFAULT_FROM_EMAIL").unwrap_or(defaults.default_from_email),
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
            database_max_connections: 10,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: StripeClient::DEFAULT_API_BASE.to_string(),
            checkout_success_url: "http://localhost:3000/checkout/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
            currency: "usd".to_string(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            mailjet_api_key: None,
            mailjet_api_secret: None,
            default_from_email: "noreply@example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.currency, "usd");
        assert_eq!(config.webhook_tolerance_secs, 300);
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
}
