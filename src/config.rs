use log::info;
use std::env;
use std::str::FromStr;
use tokio::time::Duration;

use crate::database::RetryPolicy;
use crate::payload::Thresholds;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_QUERY_LIMIT: usize = 50;
const MAX_QUERY_LIMIT: usize = 500;
pub const DEFAULT_MEMORY_RETENTION: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits {
            default_limit: DEFAULT_QUERY_LIMIT,
            max_limit: MAX_QUERY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
    pub query: QueryLimits,
    pub thresholds: Thresholds,
    /// Readings kept by the in-memory store
    pub memory_retention: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            port: DEFAULT_PORT,
            database_url: None,
            retry: RetryPolicy::default(),
            query: QueryLimits::default(),
            thresholds: Thresholds::default(),
            memory_retention: DEFAULT_MEMORY_RETENTION,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::from_lookup(|key| env::var(key).ok())?;

        info!("Listening port: {}", config.port);
        info!(
            "Store: {}",
            if config.database_url.is_some() {
                "PostgreSQL"
            } else {
                "in-memory"
            }
        );
        info!("Alert thresholds: {:?}", config.thresholds);

        Ok(config)
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();

        let database_url = lookup("DATABASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let max_retries: usize = parse_var(&lookup, "DB_MAX_RETRIES", defaults.retry.max_retries)?;
        if max_retries == 0 {
            return Err("DB_MAX_RETRIES must be at least 1".into());
        }
        let wait_secs: u64 = parse_var(
            &lookup,
            "DB_RETRY_WAIT_SECS",
            defaults.retry.wait_between_retries.as_secs(),
        )?;

        let query = QueryLimits {
            default_limit: parse_var(&lookup, "QUERY_DEFAULT_LIMIT", defaults.query.default_limit)?,
            max_limit: parse_var(&lookup, "QUERY_MAX_LIMIT", defaults.query.max_limit)?,
        };
        if query.default_limit > query.max_limit {
            return Err("QUERY_DEFAULT_LIMIT cannot exceed QUERY_MAX_LIMIT".into());
        }

        let memory_retention: usize =
            parse_var(&lookup, "MEMORY_MAX_READINGS", defaults.memory_retention)?;
        if memory_retention == 0 {
            return Err("MEMORY_MAX_READINGS must be at least 1".into());
        }

        let t = defaults.thresholds;
        let thresholds = Thresholds {
            temperature_low: parse_var(&lookup, "ALERT_TEMPERATURE_LOW", t.temperature_low)?,
            temperature_high: parse_var(&lookup, "ALERT_TEMPERATURE_HIGH", t.temperature_high)?,
            humidity_low: parse_var(&lookup, "ALERT_HUMIDITY_LOW", t.humidity_low)?,
            humidity_high: parse_var(&lookup, "ALERT_HUMIDITY_HIGH", t.humidity_high)?,
            battery_low: parse_var(&lookup, "ALERT_BATTERY_LOW", t.battery_low)?,
        };

        Ok(ServiceConfig {
            port: parse_var(&lookup, "PORT", defaults.port)?,
            database_url,
            retry: RetryPolicy {
                max_retries,
                wait_between_retries: Duration::from_secs(wait_secs),
            },
            query,
            thresholds,
            memory_retention,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value '{}' for {}: {}", value, key, e).into()),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.thresholds.temperature_low, 1650);
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = load(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/sigfox"),
            ("DB_MAX_RETRIES", "5"),
            ("DB_RETRY_WAIT_SECS", "2"),
            ("QUERY_DEFAULT_LIMIT", "10"),
            ("ALERT_TEMPERATURE_LOW", "-100"),
            ("ALERT_BATTERY_LOW", " 3300 "),
            ("MEMORY_MAX_READINGS", "200"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/sigfox"));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.wait_between_retries, Duration::from_secs(2));
        assert_eq!(config.query.default_limit, 10);
        assert_eq!(config.thresholds.temperature_low, -100);
        assert_eq!(config.thresholds.battery_low, 3300);
        assert_eq!(config.thresholds.humidity_high, 2200);
        assert_eq!(config.memory_retention, 200);
    }

    #[test]
    fn blank_database_url_means_memory() {
        let config = load(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("ALERT_HUMIDITY_LOW", "1.5")]).is_err());
        assert!(load(&[("DB_MAX_RETRIES", "0")]).is_err());
        assert!(load(&[("QUERY_DEFAULT_LIMIT", "900")]).is_err());
        assert!(load(&[("MEMORY_MAX_READINGS", "0")]).is_err());
    }
}
