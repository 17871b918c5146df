use serde::Deserialize;

/// Prefix shared by every environment variable this crate reads
pub const ENV_PREFIX: &str = "PAWFEED_";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_consecutive")]
    pub max_consecutive: usize,
    #[serde(default = "default_trending_window_hours")]
    pub trending_window_hours: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_consecutive: default_max_consecutive(),
            trending_window_hours: default_trending_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    #[serde(default, rename = "store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub redis_key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            redis_key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_page_size() -> usize {
    12
}

fn default_max_consecutive() -> usize {
    1
}

fn default_trending_window_hours() -> i64 {
    24
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "pawfeed".to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit `(name, value)` pairs; names carry the `PAWFEED_` prefix.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        Ok(Config {
            feed: envy::prefixed(ENV_PREFIX).from_iter(vars.clone())?,
            store: envy::prefixed(ENV_PREFIX).from_iter(vars.clone())?,
            telemetry: envy::prefixed(ENV_PREFIX).from_iter(vars)?,
        })
    }
}
