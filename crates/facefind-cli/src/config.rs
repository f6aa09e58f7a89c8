use facefind_api::ClientOptions;
use facefind_core::render::DEFAULT_CROP_SIZE;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the face backend (default: http://localhost:8001).
    pub backend_url: String,
    /// TCP connect timeout in seconds; unset means no timeout.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds; unset means no timeout.
    pub request_timeout_secs: Option<u64>,
    /// Side length of the face crop in rendered reports.
    pub crop_size: u32,
}

impl Config {
    /// Load configuration from `FACEFIND_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            backend_url: lookup("FACEFIND_BACKEND_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            connect_timeout_secs: parsed(&lookup, "FACEFIND_CONNECT_TIMEOUT_SECS"),
            request_timeout_secs: parsed(&lookup, "FACEFIND_REQUEST_TIMEOUT_SECS"),
            crop_size: parsed::<u32>(&lookup, "FACEFIND_CROP_SIZE")
                .filter(|&size| size > 0)
                .unwrap_or(DEFAULT_CROP_SIZE),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparsable setting");
            None
        }
    }
}
