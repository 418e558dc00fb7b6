//! Minimal HTTP/1.1 request parsing.
//!
//! Only what the API surface needs is recognized: a GET or OPTIONS
//! request line plus a header block terminated by an empty line. Header
//! fields themselves are not interpreted; every connection carries
//! exactly one request.

use thiserror::Error;

use crate::error::HttpError;
use crate::normalize::percent_decode;

/// Longest accepted request target, in bytes.
pub const MAX_TARGET_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("malformed request")]
    Malformed,

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("request target too long ({0} bytes)")]
    UriTooLong(usize),

    #[error("request header block too large")]
    TooLarge,
}

impl HttpError for RequestError {
    fn status_code(&self) -> u16 {
        match self {
            Self::Malformed => 400,
            Self::MethodNotAllowed(_) => 405,
            Self::UriTooLong(_) => 414,
            Self::TooLarge => 413,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Options,
}

/// A parsed single-shot request.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Request target exactly as received, query string included.
    pub raw_target: String,
    /// Percent-decoded path, query string stripped.
    pub path: String,
    /// Query parameters in order of appearance, first occurrence wins.
    pub query: Vec<(String, String)>,
}

impl Request {
    /// Parse the header block of a request. `head` must contain the
    /// full block up to and including the `\r\n\r\n` terminator.
    pub fn parse(head: &[u8]) -> Result<Self, RequestError> {
        let text = std::str::from_utf8(head).map_err(|_| RequestError::Malformed)?;
        let request_line = text.lines().next().ok_or(RequestError::Malformed)?;

        let mut parts = request_line.split_whitespace();
        let method_token = parts.next().ok_or(RequestError::Malformed)?;
        let target = parts.next().ok_or(RequestError::Malformed)?;
        let version = parts.next().ok_or(RequestError::Malformed)?;
        if parts.next().is_some() || !version.starts_with("HTTP/") {
            return Err(RequestError::Malformed);
        }

        let method = match method_token {
            "GET" => Method::Get,
            "OPTIONS" => Method::Options,
            other => return Err(RequestError::MethodNotAllowed(other.to_string())),
        };

        if !target.starts_with('/') {
            return Err(RequestError::Malformed);
        }
        if target.len() > MAX_TARGET_LEN {
            return Err(RequestError::UriTooLong(target.len()));
        }

        let (path_part, query_part) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };

        Ok(Self {
            method,
            raw_target: target.to_string(),
            path: percent_decode(path_part),
            query: query_part.map(parse_query).unwrap_or_default(),
        })
    }

    /// First occurrence of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a query string at `&`, each token at the first `=`.
/// Values are percent-decoded; duplicate keys keep the first occurrence.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    for token in query.split('&') {
        if token.is_empty() {
            continue;
        }
        let (name, value) = match token.split_once('=') {
            Some((n, v)) => (n, v),
            None => (token, ""),
        };
        if params.iter().any(|(k, _)| k == name) {
            continue;
        }
        params.push((name.to_string(), percent_decode(value)));
    }
    params
}
