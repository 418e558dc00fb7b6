pub mod cache;
pub mod cities;
pub mod config;
pub mod error;
pub mod normalize;
pub mod routes;
pub mod server;
pub mod surprise;
pub mod upstream;
pub mod weather;

use std::path::Path;
use std::sync::Arc;

use crate::cache::{GeoCache, WeatherCache};
use crate::config::AppConfig;
use crate::upstream::UpstreamClient;
use crate::weather::WeatherService;

/// Everything a connection needs to serve a request.
pub struct AppState {
    pub config: AppConfig,
    pub geo_cache: Arc<GeoCache>,
    pub weather_cache: Arc<WeatherCache>,
    pub weather: WeatherService,
}

impl AppState {
    /// Load both caches and wire up the weather service.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let cache_dir = Path::new(&config.cache_dir);
        let geo_cache = Arc::new(GeoCache::load(cache_dir).await?);
        let weather_cache = Arc::new(WeatherCache::init(cache_dir.join("weather")).await?);

        let client = UpstreamClient::new(config.max_response_bytes);
        let weather = WeatherService::new(
            client,
            geo_cache.clone(),
            weather_cache.clone(),
            config.geocoding_host.clone(),
            config.forecast_host.clone(),
            config.upstream_port,
        );

        Ok(Self {
            config,
            geo_cache,
            weather_cache,
            weather,
        })
    }
}
