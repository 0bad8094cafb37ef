use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_BASE_URL: &str = "https://account.example/api/v1/";
/// Refresh this long before the access token expires
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 30;

const ENV_BASE_URL: &str = "SELFCARE_API_BASE_URL";
const ENV_REFRESH_MARGIN: &str = "SELFCARE_REFRESH_MARGIN_SECS";
const ENV_REQUEST_TIMEOUT: &str = "SELFCARE_REQUEST_TIMEOUT_SECS";
const ENV_DATA_DIR: &str = "SELFCARE_DATA_DIR";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, always ending in `/`
    pub base_url: Url,
    pub refresh_margin: Duration,
    /// None leaves requests unbounded
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
    /// Where the profile store lives
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS),
            request_timeout: None,
            user_agent: format!("account-selfcare/{}", env!("CARGO_PKG_VERSION")),
            data_dir: PathBuf::from(".account-selfcare"),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `SELFCARE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config = config.with_base_url(&base_url)?;
        }
        if let Some(secs) = read_secs(ENV_REFRESH_MARGIN)? {
            config.refresh_margin = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs(ENV_REQUEST_TIMEOUT)? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }

        log::debug!(
            "Loaded client config: base_url={}, refresh_margin={}s",
            config.base_url,
            config.refresh_margin.as_secs()
        );
        Ok(config)
    }

    /// Set the API root. A trailing slash is added so that joining
    /// `login` onto `.../api/v1` keeps the version segment.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let url = Url::parse(&normalized)
            .map_err(|e| ClientError::Config(format!("Failed to parse base URL: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Base URL cannot carry paths: {}",
                base_url
            )));
        }
        self.base_url = url;
        Ok(self)
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

fn read_secs(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("{} must be whole seconds: {}", key, e))),
        Err(_) => Ok(None),
    }
}
