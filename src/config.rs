use std::env;
use std::time::Duration;

use log::warn;

use crate::backend::Backend;
use crate::error::ConfigError;

const DEFAULT_PROXY_PORT: u16 = 9090;
const DEFAULT_METRICS_INTERVAL_SECS: u64 = 60;
const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct SslConfig {
    pub enabled: bool,
    pub cert: String,
    pub key: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backends: Vec<Backend>,
    /// Base URL of the supervising balancer; heartbeat is off when unset.
    pub loadbalancer_api: Option<String>,
    pub proxy_port: u16,
    pub metrics_interval: Duration,
    pub health_check_interval: Duration,
    pub probe_timeout: Duration,
    pub ssl: SslConfig,
}

impl Config {
    /// Reads the process environment. `.env` must already be loaded.
    pub fn from_env(args_proxy_port: Option<u16>) -> Result<Self, ConfigError> {
        let backends = parse_backends(
            &env::var("LIST_OF_MAIN_SERVICE_API").map_err(|_| ConfigError::MissingBackends)?,
        )?;

        let loadbalancer_api = env::var("LOADBALANCER_API")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if loadbalancer_api.is_none() {
            warn!("⚠️ LOADBALANCER_API not set in environment, heartbeat disabled");
        }

        Ok(Config {
            backends,
            loadbalancer_api,
            proxy_port: args_proxy_port
                .unwrap_or_else(|| env_or("PROXY_PORT", DEFAULT_PROXY_PORT)),
            metrics_interval: Duration::from_secs(env_or(
                "METRICS_INTERVAL_SECONDS",
                DEFAULT_METRICS_INTERVAL_SECS,
            )),
            health_check_interval: Duration::from_secs(env_or(
                "HEALTH_CHECK_INTERVAL_SECONDS",
                DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            )),
            probe_timeout: Duration::from_secs(env_or(
                "PROBE_TIMEOUT_SECONDS",
                DEFAULT_PROBE_TIMEOUT_SECS,
            )),
            ssl: SslConfig {
                enabled: env::var("SSL")
                    .unwrap_or_else(|_| "OFF".to_string())
                    .to_uppercase()
                    == "ON",
                cert: env::var("SSL_CERT").unwrap_or_else(|_| "ssl/server.pem".to_string()),
                key: env::var("SSL_KEY").unwrap_or_else(|_| "ssl/server.key".to_string()),
            },
        })
    }
}

/// Splits the comma-separated backend list, keeping configured order.
pub fn parse_backends(val: &str) -> Result<Vec<Backend>, ConfigError> {
    let backends: Vec<Backend> = val
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Backend::new)
        .collect();

    if backends.is_empty() {
        return Err(ConfigError::EmptyBackends);
    }
    Ok(backends)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => parse_or(key, &val, default),
        Err(_) => default,
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, val: &str, default: T) -> T {
    val.trim().parse().unwrap_or_else(|_| {
        warn!("⚠️ Failed to parse {} (value={}), using default", key, val);
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_keep_order_and_skip_blanks() {
        let backends =
            parse_backends(" http://a:1/metrics, ,http://b:2/metrics,http://c:3/metrics ").unwrap();
        let urls: Vec<&str> = backends.iter().map(|b| b.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["http://a:1/metrics", "http://b:2/metrics", "http://c:3/metrics"]
        );
    }

    #[test]
    fn blank_backend_list_is_rejected() {
        assert!(matches!(parse_backends(""), Err(ConfigError::EmptyBackends)));
        assert!(matches!(parse_backends(" , "), Err(ConfigError::EmptyBackends)));
    }

    #[test]
    fn unparsable_number_falls_back_to_default() {
        assert_eq!(parse_or("METRICS_INTERVAL_SECONDS", "soon", 60u64), 60);
        assert_eq!(parse_or("METRICS_INTERVAL_SECONDS", " 15 ", 60u64), 15);
        assert_eq!(parse_or("PROXY_PORT", "70000", 9090u16), 9090);
    }
}
