use std::sync::Arc;

use thiserror::Error;

use super::models::GeocodeResponse;
use crate::cache::{GeoCache, GeoCacheError, GeoEntry, WeatherCache};
use crate::error::HttpError;
use crate::normalize::{normalize_city, percent_encode};
use crate::upstream::{UpstreamClient, UpstreamError};

/// Upstream rate-limit payloads must never be served from cache.
const POISON_MARKER: &str = "Too many concurrent requests";

const FORECAST_HOURLY: &str = "temperature_2m,relative_humidity_2m,windspeed_10m";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Location not found")]
    CityNotFound(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),
}

impl HttpError for WeatherError {
    fn status_code(&self) -> u16 {
        match self {
            Self::CityNotFound(_) => 404,
            Self::Upstream(_) => 500,
        }
    }

    fn city(&self) -> Option<&str> {
        match self {
            Self::CityNotFound(city) => Some(city),
            _ => None,
        }
    }
}

pub struct WeatherService {
    client: UpstreamClient,
    geo_cache: Arc<GeoCache>,
    weather_cache: Arc<WeatherCache>,
    geocoding_host: String,
    forecast_host: String,
    upstream_port: u16,
}

impl WeatherService {
    pub fn new(
        client: UpstreamClient,
        geo_cache: Arc<GeoCache>,
        weather_cache: Arc<WeatherCache>,
        geocoding_host: impl Into<String>,
        forecast_host: impl Into<String>,
        upstream_port: u16,
    ) -> Self {
        Self {
            client,
            geo_cache,
            weather_cache,
            geocoding_host: geocoding_host.into(),
            forecast_host: forecast_host.into(),
            upstream_port,
        }
    }

    /// Resolve a requested city to an augmented forecast JSON body.
    ///
    /// The requested name (decoded, possibly mixed-case) is preserved
    /// and echoed back as `req_location`; the geocoder's canonical
    /// name goes into `city`.
    pub async fn lookup(&self, requested: &str) -> Result<String, WeatherError> {
        let key = normalize_city(requested);
        if key.is_empty() {
            return Err(WeatherError::CityNotFound(requested.to_string()));
        }

        let place = match self.geo_cache.lookup(&key).await {
            Some(entry) => {
                tracing::debug!(city = %key, "geocode cache hit");
                entry
            }
            None => {
                tracing::debug!(city = %key, "geocode cache miss");
                let resolved = self.geocode(&key, requested).await?;
                match self
                    .geo_cache
                    .insert(requested, &resolved.name, resolved.lat, resolved.lon)
                    .await
                {
                    Ok(()) => {}
                    Err(GeoCacheError::IllegalCoordinates(lat, lon)) => {
                        tracing::warn!(city = %key, lat, lon, "geocoder returned illegal coordinates");
                        return Err(WeatherError::CityNotFound(requested.to_string()));
                    }
                    Err(GeoCacheError::Io(e)) => {
                        // Serving the request matters more than persisting the cache.
                        tracing::warn!(error = %e, "failed to persist geocode cache");
                    }
                }
                resolved
            }
        };

        if let Some(cached) = self
            .weather_cache
            .get_by_coords(&key, place.lat, place.lon)
            .await
        {
            if cached.contains(POISON_MARKER) {
                tracing::warn!(city = %key, "evicting poisoned forecast from cache");
                if let Err(e) = self
                    .weather_cache
                    .remove_by_coords(&key, place.lat, place.lon)
                    .await
                {
                    tracing::warn!(error = %e, "failed to evict poisoned forecast");
                }
            } else {
                tracing::debug!(city = %key, "weather cache hit");
                return augment(&cached, &place.name, requested);
            }
        }

        self.fetch_forecast(&key, &place, requested).await
    }

    /// Geocode a normalized name, retrying once with å mapped to ä.
    /// The retry covers seed data recorded with the legacy spelling.
    async fn geocode(&self, key: &str, requested: &str) -> Result<GeoEntry, WeatherError> {
        if let Some(entry) = self.geocode_once(key).await? {
            return Ok(entry);
        }

        if key.contains('å') {
            let alt = key.replace('å', "ä");
            tracing::debug!(city = %key, alt = %alt, "retrying geocode with alternate spelling");
            if let Some(entry) = self.geocode_once(&alt).await? {
                return Ok(entry);
            }
        }

        Err(WeatherError::CityNotFound(requested.to_string()))
    }

    async fn geocode_once(&self, name: &str) -> Result<Option<GeoEntry>, WeatherError> {
        let path = format!(
            "/v1/search?name={}&count=1&language=en&format=json",
            percent_encode(name)
        );
        let response = self
            .client
            .get(&self.geocoding_host, self.upstream_port, &path)
            .await?;

        let decoded: GeocodeResponse =
            serde_json::from_slice(&response.body).map_err(|_| UpstreamError::Parse)?;
        let Some(first) = decoded.results.into_iter().next() else {
            return Ok(None);
        };

        let lat = round4(first.latitude);
        let lon = round4(first.longitude);
        if lat.abs() < 1e-4 && lon.abs() < 1e-4 {
            // Null island means the geocoder had nothing real to say.
            return Ok(None);
        }

        tracing::info!(city = %name, resolved = %first.name, lat, lon, "geocoded city");
        Ok(Some(GeoEntry {
            name: first.name,
            lat,
            lon,
        }))
    }

    async fn fetch_forecast(
        &self,
        key: &str,
        place: &GeoEntry,
        requested: &str,
    ) -> Result<String, WeatherError> {
        let path = format!(
            "/v1/forecast?latitude={:.6}&longitude={:.6}&current_weather=true&hourly={}&timezone=auto",
            place.lat, place.lon, FORECAST_HOURLY
        );
        let response = self
            .client
            .get(&self.forecast_host, self.upstream_port, &path)
            .await?;

        let body = String::from_utf8(response.body).map_err(|_| UpstreamError::Parse)?;
        // Validates the payload as a JSON object before anything is cached.
        let augmented = augment(&body, &place.name, requested)?;

        // The body is persisted as received; the augmented fields are
        // computed per request.
        if let Err(e) = self
            .weather_cache
            .set_by_coords(key, place.lat, place.lon, &body)
            .await
        {
            tracing::warn!(error = %e, city = %key, "failed to cache forecast");
        }

        tracing::info!(city = %key, bytes = augmented.len(), "forecast fetched");
        Ok(augmented)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Inject `city` and `req_location` into a forecast object and
/// re-serialize compactly.
fn augment(body: &str, city: &str, req_location: &str) -> Result<String, WeatherError> {
    let mut value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| UpstreamError::Parse)?;
    let object = value.as_object_mut().ok_or(UpstreamError::Parse)?;
    object.insert("city".to_string(), serde_json::Value::String(city.to_string()));
    object.insert(
        "req_location".to_string(),
        serde_json::Value::String(req_location.to_string()),
    );
    serde_json::to_string(&value).map_err(|_| WeatherError::Upstream(UpstreamError::Parse))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(59.329323), 59.3293);
        assert_eq!(round4(18.06861), 18.0686);
        assert_eq!(round4(13.191), 13.191);
    }

    #[test]
    fn test_augment_injects_fields() {
        let out = augment(r#"{"current_weather":{"temperature":5}}"#, "Stockholm", "STOCKHOLM")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["city"], "Stockholm");
        assert_eq!(value["req_location"], "STOCKHOLM");
        assert_eq!(value["current_weather"]["temperature"], 5);
    }

    #[test]
    fn test_augment_rejects_non_object() {
        assert!(augment("[1,2]", "a", "b").is_err());
        assert!(augment("not json", "a", "b").is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(WeatherError::CityNotFound("x".into()).status_code(), 404);
        assert_eq!(
            WeatherError::Upstream(UpstreamError::Parse).status_code(),
            500
        );
    }

    #[test]
    fn test_city_not_found_body_fields() {
        let err = WeatherError::CityNotFound("Xyzzy".into());
        assert_eq!(err.to_string(), "Location not found");
        assert_eq!(err.city(), Some("Xyzzy"));
    }
}
