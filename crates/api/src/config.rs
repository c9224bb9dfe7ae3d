//! Application configuration loaded from environment variables.

use secrecy::SecretString;

const DEV_CONFIRMATION_SECRET: &str = "dev-only-confirmation-secret";
const DEV_GATEWAY_SECRET: &str = "dev-only-gateway-secret";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `PUBLIC_BASE_URL`: prefix for links in emails (default `http://localhost:3000`)
/// - `CONFIRMATION_SECRET`: HMAC key for email links
/// - `PAYMENT_CALLBACK_SECRET`: HMAC key the gateway signs callbacks with
/// - `CONFIRMATION_TTL_HOURS`: link lifetime (default `48`)
/// - `MAIL_QUEUE_CAPACITY`: outbox size (default `256`)
/// - `FULFILLMENT_KEY`: value staff send in `x-fulfillment-key`; unset disables the staff routes
/// - `CURRENCY`: currency for card charges (default `USD`)
/// - `DATABASE_URL`: Postgres event store; the in-memory store is used when unset
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub public_base_url: String,
    pub confirmation_secret: SecretString,
    pub gateway_secret: SecretString,
    pub confirmation_ttl_hours: i64,
    pub mail_queue_capacity: usize,
    pub fulfillment_key: Option<SecretString>,
    pub currency: String,
    pub database_url: Option<SecretString>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let confirmation_secret = match non_empty("CONFIRMATION_SECRET") {
            Some(secret) => SecretString::from(secret),
            None => {
                tracing::warn!(
                    "CONFIRMATION_SECRET is not set, using the development secret; \
                     email links are forgeable"
                );
                defaults.confirmation_secret
            }
        };

        let gateway_secret = match non_empty("PAYMENT_CALLBACK_SECRET") {
            Some(secret) => SecretString::from(secret),
            None => {
                tracing::warn!(
                    "PAYMENT_CALLBACK_SECRET is not set, using the development secret; \
                     payment callbacks are forgeable"
                );
                defaults.gateway_secret
            }
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parsed(&non_empty, "PORT").unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            public_base_url: non_empty("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            confirmation_secret,
            gateway_secret,
            confirmation_ttl_hours: parsed(&non_empty, "CONFIRMATION_TTL_HOURS")
                .filter(|hours: &i64| *hours > 0)
                .unwrap_or(defaults.confirmation_ttl_hours),
            mail_queue_capacity: parsed(&non_empty, "MAIL_QUEUE_CAPACITY")
                .filter(|capacity: &usize| *capacity > 0)
                .unwrap_or(defaults.mail_queue_capacity),
            fulfillment_key: non_empty("FULFILLMENT_KEY").map(SecretString::from),
            currency: non_empty("CURRENCY").unwrap_or(defaults.currency),
            database_url: non_empty("DATABASE_URL").map(SecretString::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            confirmation_secret: SecretString::from(DEV_CONFIRMATION_SECRET.to_string()),
            gateway_secret: SecretString::from(DEV_GATEWAY_SECRET.to_string()),
            confirmation_ttl_hours: workflows::DEFAULT_TOKEN_TTL_HOURS,
            mail_queue_capacity: 256,
            fulfillment_key: None,
            currency: "USD".to_string(),
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn from_map(pairs: &[(&str, &str)]) -> Config {
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
        assert_eq!(config.confirmation_ttl_hours, 48);
        assert_eq!(config.mail_queue_capacity, 256);
        assert_eq!(config.currency, "USD");
        assert!(config.fulfillment_key.is_none());
        assert!(config.database_url.is_none());
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
    fn test_reads_values() {
        let config = from_map(&[
            ("PORT", "8081"),
            ("PUBLIC_BASE_URL", "https://shop.example"),
            ("CONFIRMATION_SECRET", "s3cret"),
            ("PAYMENT_CALLBACK_SECRET", "gw-s3cret"),
            ("CONFIRMATION_TTL_HOURS", "12"),
            ("MAIL_QUEUE_CAPACITY", "8"),
            ("FULFILLMENT_KEY", "staff"),
            ("CURRENCY", "EUR"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.public_base_url, "https://shop.example");
        assert_eq!(config.confirmation_secret.expose_secret(), "s3cret");
        assert_eq!(config.gateway_secret.expose_secret(), "gw-s3cret");
        assert_eq!(config.confirmation_ttl_hours, 12);
        assert_eq!(config.mail_queue_capacity, 8);
        assert_eq!(
            config.fulfillment_key.as_ref().map(|k| k.expose_secret()),
            Some("staff")
        );
        assert_eq!(config.currency, "EUR");
        assert!(config.database_url.is_some());
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = from_map(&[
            ("PORT", "not-a-port"),
            ("CONFIRMATION_TTL_HOURS", "-3"),
            ("MAIL_QUEUE_CAPACITY", "0"),
            ("CONFIRMATION_SECRET", "  "),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.confirmation_ttl_hours, 48);
        assert_eq!(config.mail_queue_capacity, 256);
        assert_eq!(
            config.confirmation_secret.expose_secret(),
            DEV_CONFIRMATION_SECRET
        );
        assert_eq!(config.gateway_secret.expose_secret(), DEV_GATEWAY_SECRET);
    }
}
