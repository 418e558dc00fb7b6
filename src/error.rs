use serde::Serialize;

use crate::server::response::Response;

/// Standard error response format for all API errors
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            city: None,
        }
    }

    pub fn with_city(error: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            city: Some(city.into()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

/// Trait for errors that can be converted to HTTP responses
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> u16;

    /// City to echo back in the error body, when one is involved
    fn city(&self) -> Option<&str> {
        None
    }
}

/// Convert any HttpError into response bytes
pub fn to_response<E: HttpError>(err: &E) -> Response {
    let status = err.status_code();
    let message = err.to_string();

    tracing::error!(
        error = %message,
        status = status,
        "API error"
    );

    let body = match err.city() {
        Some(city) => ErrorResponse::with_city(message, city),
        None => ErrorResponse::new(message),
    };

    Response::json(status, body.to_bytes())
}
