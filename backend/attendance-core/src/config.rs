// src/config.rs

use serde::Deserialize;
use std::time::Duration;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::directory_cache::DEFAULT_CACHE_TTL_SECS;
use crate::http_client::{HttpApiConfig, DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS};
use crate::session::{SessionConfig, DEFAULT_THROTTLE_MS};
use crate::view::DEFAULT_PAGE_SIZE;

pub const ENV_PREFIX: &str = "ATTENDANCE_";

//=============================================================================
// Configuration
//=============================================================================

/// Engine settings, read from `ATTENDANCE_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EngineConfig {
    // Remote service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // Fan-out and retries
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    // Cache and session
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    // View
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<EngineConfig>()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }

    pub fn http_config(&self) -> HttpApiConfig {
        HttpApiConfig {
            base_url: self.api_base_url.clone(),
            auth_token: self.auth_token.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = EngineConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.session_config().throttle, Duration::from_secs(1));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_prefixed_variables_override_defaults() {
        let config = EngineConfig::from_vars(vars(&[
            ("ATTENDANCE_API_BASE_URL", "https://hr.example.com/api"),
            ("ATTENDANCE_AUTH_TOKEN", "secret"),
            ("ATTENDANCE_BATCH_SIZE", "8"),
            ("ATTENDANCE_MAX_RETRIES", "5"),
            ("ATTENDANCE_RETRY_BASE_DELAY_MS", "250"),
            ("BATCH_SIZE", "99"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 8);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_retries: 5,
                base_delay: Duration::from_millis(250),
            }
        );
        let http = config.http_config();
        assert_eq!(http.base_url, "https://hr.example.com/api");
        assert_eq!(http.auth_token, "secret");
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = EngineConfig::from_vars(vars(&[("ATTENDANCE_BATCH_SIZE", "five")]));
        assert!(result.is_err());
    }
}
