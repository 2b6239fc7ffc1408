use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ratelimit::{DEFAULT_RATE_LIMIT, RateLimitMode};

pub const DEFAULT_BASE_URL: &str = "https://api.openaq.org/v3/";
pub const API_KEY_ENV: &str = "OPENAQ_API_KEY";
pub const CONFIG_FILE_NAME: &str = ".openaq.toml";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Settings shared by [`Client`](crate::Client) and [`AsyncClient`](crate::AsyncClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent as `X-API-Key`. When `None`, the environment and `~/.openaq.toml`
    /// are consulted at construction.
    pub api_key: Option<String>,
    /// API root, `https://api.openaq.org/v3/` unless pointed elsewhere.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    pub rate_limit_mode: RateLimitMode,
    /// Quota assumed until the first response reports the real one.
    pub rate_limit: u32,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
    /// Sent with every request. `User-Agent`, `Accept` and `X-API-Key` are
    /// always set by the client and override entries here.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            rate_limit_mode: RateLimitMode::default(),
            rate_limit: DEFAULT_RATE_LIMIT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            user_agent: format!("openaq-rs/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shorthand for [`RateLimitMode::AutoWait`] (`true`) or
    /// [`RateLimitMode::Reactive`] (`false`).
    pub fn with_auto_wait(mut self, auto_wait: bool) -> Self {
        self.rate_limit_mode = if auto_wait {
            RateLimitMode::AutoWait
        } else {
            RateLimitMode::Reactive
        };
        self
    }

    pub fn with_rate_limit_mode(mut self, mode: RateLimitMode) -> Self {
        self.rate_limit_mode = mode;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    pub fn with_pool_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header to every request. Invalid names or values are reported
    /// when the client is built.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Fills in the API key from the environment or the config file and
    /// checks the result is usable.
    pub(crate) fn resolve(mut self) -> Result<Self> {
        self.api_key = lookup_api_key(
            self.api_key.take(),
            std::env::var(API_KEY_ENV).ok(),
            config_file_path().as_deref(),
        )?;
        self.finish()
    }

    fn finish(mut self) -> Result<Self> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base URL {:?} cannot be used as a base",
                self.base_url
            )));
        }
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        if self.api_key.is_none() && self.base_url == DEFAULT_BASE_URL {
            return Err(Error::ApiKeyMissing);
        }
        Ok(self)
    }
}

/// Precedence: explicit argument, then environment, then config file.
/// Blank values count as unset.
pub fn resolve_api_key(
    explicit: Option<String>,
    env: Option<String>,
    file: Option<String>,
) -> Option<String> {
    [explicit, env, file]
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// The config file is only read when neither the explicit key nor the
/// environment supplies one.
fn lookup_api_key(
    explicit: Option<String>,
    env: Option<String>,
    file: Option<&Path>,
) -> Result<Option<String>> {
    if let Some(key) = resolve_api_key(explicit, env, None) {
        return Ok(Some(key));
    }
    match file {
        Some(path) if path.exists() => {
            let file = read_config_file(path)?.api_key;
            Ok(resolve_api_key(None, None, file))
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FileConfig {
    #[serde(rename = "api-key", default)]
    pub(crate) api_key: Option<String>,
}

pub(crate) fn read_config_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}
