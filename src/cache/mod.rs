pub mod geocode;
pub mod weather;

pub use geocode::{GeoCache, GeoCacheError, GeoEntry};
pub use weather::WeatherCache;
