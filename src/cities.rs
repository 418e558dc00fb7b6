//! Compiled-in seed city table served by `/cities`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SeedCity {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const SEED_CITIES: &[SeedCity] = &[
    SeedCity { name: "Stockholm", latitude: 59.3293, longitude: 18.0686 },
    SeedCity { name: "Göteborg", latitude: 57.7089, longitude: 11.9746 },
    SeedCity { name: "Malmö", latitude: 55.6050, longitude: 13.0038 },
    SeedCity { name: "Uppsala", latitude: 59.8586, longitude: 17.6389 },
    SeedCity { name: "Västerås", latitude: 59.6099, longitude: 16.5448 },
    SeedCity { name: "Örebro", latitude: 59.2741, longitude: 15.2066 },
    SeedCity { name: "Linköping", latitude: 58.4109, longitude: 15.6216 },
    SeedCity { name: "Helsingborg", latitude: 56.0465, longitude: 12.6945 },
    SeedCity { name: "Jönköping", latitude: 57.7826, longitude: 14.1618 },
    SeedCity { name: "Norrköping", latitude: 58.5877, longitude: 16.1924 },
    SeedCity { name: "Lund", latitude: 55.7047, longitude: 13.1910 },
    SeedCity { name: "Umeå", latitude: 63.8258, longitude: 20.2630 },
    SeedCity { name: "Gävle", latitude: 60.6749, longitude: 17.1413 },
    SeedCity { name: "Borås", latitude: 57.7210, longitude: 12.9401 },
    SeedCity { name: "Södertälje", latitude: 59.1955, longitude: 17.6252 },
    SeedCity { name: "Eskilstuna", latitude: 59.3666, longitude: 16.5077 },
    SeedCity { name: "Karlstad", latitude: 59.4022, longitude: 13.5115 },
    SeedCity { name: "Luleå", latitude: 65.5848, longitude: 22.1547 },
    SeedCity { name: "Kiruna", latitude: 67.8558, longitude: 20.2253 },
    SeedCity { name: "Visby", latitude: 57.6348, longitude: 18.2948 },
];

/// The `/cities` body: the seed table as a JSON array, in table order.
pub fn cities_json() -> Vec<u8> {
    serde_json::to_vec(SEED_CITIES).unwrap_or_else(|_| b"[]".to_vec())
}
