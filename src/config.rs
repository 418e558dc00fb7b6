use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Geocoding API host
    #[serde(default = "default_geocoding_host")]
    pub geocoding_host: String,

    /// Forecast API host
    #[serde(default = "default_forecast_host")]
    pub forecast_host: String,

    /// Port for both upstream APIs
    #[serde(default = "default_upstream_port")]
    pub upstream_port: u16,

    /// Directory holding both on-disk caches
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Directory of files served under /surprise
    #[serde(default = "default_surprise_dir")]
    pub surprise_dir: String,

    /// Per-phase connection timeout in seconds
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Maximum concurrently served connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Upstream response size cap in bytes
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Seconds between weather-cache cleanup sweeps
    #[serde(default = "default_cache_cleanup_interval_secs")]
    pub cache_cleanup_interval_secs: u64,

    /// Age in seconds past which cached forecasts are swept
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    10480
}

fn default_geocoding_host() -> String {
    "geocoding-api.open-meteo.com".to_string()
}

fn default_forecast_host() -> String {
    "api.open-meteo.com".to_string()
}

fn default_upstream_port() -> u16 {
    80
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_surprise_dir() -> String {
    "surprise".to_string()
}

fn default_connection_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1024
}

fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_cache_cleanup_interval_secs() -> u64 {
    15 * 60
}

fn default_cache_max_age_secs() -> u64 {
    24 * 60 * 60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            geocoding_host: default_geocoding_host(),
            forecast_host: default_forecast_host(),
            upstream_port: default_upstream_port(),
            cache_dir: default_cache_dir(),
            surprise_dir: default_surprise_dir(),
            connection_timeout_secs: default_connection_timeout_secs(),
            max_connections: default_max_connections(),
            max_response_bytes: default_max_response_bytes(),
            cache_cleanup_interval_secs: default_cache_cleanup_interval_secs(),
            cache_max_age_secs: default_cache_max_age_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Load from config file if present
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config.local").required(false))
            // Override with environment variables (prefixed with VADRET_)
            .add_source(
                Environment::with_prefix("VADRET")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(Case::Snake)
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
