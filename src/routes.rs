//! Table-driven routing over the decoded request path.

use crate::server::request::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    Cities,
    Surprise,
    Weather,
    Preflight,
    NotFound,
}

const ROUTES: &[(&str, Route)] = &[
    ("/health", Route::Health),
    ("/cities", Route::Cities),
    ("/surprise", Route::Surprise),
    ("/weather", Route::Weather),
];

/// Resolve a request to a route. OPTIONS answers the CORS pre-flight
/// for every path; everything else matches the table exactly.
pub fn resolve(method: Method, path: &str) -> Route {
    if method == Method::Options {
        return Route::Preflight;
    }
    ROUTES
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, r)| *r)
        .unwrap_or(Route::NotFound)
}
