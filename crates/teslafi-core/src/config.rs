use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "https://www.teslafi.com";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Minimum spacing between two executed refresh cycles.
    pub throttle_interval: Duration,
    /// Upper bound for a single fetch; a timed-out fetch counts as unreachable.
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            throttle_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub token: SecretString,
    pub request_timeout: Duration,
}

impl TransportConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: SecretString::from(token.into()),
            request_timeout: Duration::from_secs(10),
        }
    }
}
