//! Minimal HTTP/1.1 GET client for the upstream weather APIs.
//!
//! Every request carries `Connection: close`, so the body ends at EOF.
//! The response buffer grows geometrically up to a configured cap, and
//! `Transfer-Encoding: chunked` payloads are decoded before the body is
//! handed to callers.

pub mod resolver;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use resolver::Resolver;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("could not resolve upstream host {0}")]
    Resolve(String),

    #[error("upstream connect failed: {0}")]
    Connect(std::io::Error),

    #[error("upstream send failed: {0}")]
    Send(std::io::Error),

    #[error("upstream recv failed: {0}")]
    Recv(std::io::Error),

    #[error("upstream response exceeded {0} bytes")]
    TooLarge(usize),

    #[error("upstream refused the request")]
    Forbidden,

    #[error("upstream response malformed")]
    Parse,
}

/// A decoded upstream response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub struct UpstreamClient {
    resolver: Resolver,
    max_response_bytes: usize,
}

impl UpstreamClient {
    pub fn new(max_response_bytes: usize) -> Self {
        Self {
            resolver: Resolver::new(),
            max_response_bytes,
        }
    }

    /// Issue a single GET request and read the response to EOF.
    pub async fn get(&self, host: &str, port: u16, path: &str) -> Result<HttpResponse, UpstreamError> {
        let addr = self.resolver.resolve(host, port).await?;
        let mut stream = TcpStream::connect(addr).await.map_err(UpstreamError::Connect)?;

        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: vadret/{}\r\n\
             Accept: application/json\r\n\
             Connection: close\r\n\r\n",
            env!("CARGO_PKG_VERSION"),
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(UpstreamError::Send)?;

        tracing::debug!(host = %host, path = %path, "upstream request sent");

        let mut raw: Vec<u8> = Vec::with_capacity(16 * 1024);
        let mut chunk = [0u8; 8192];
        loop {
            let n = stream.read(&mut chunk).await.map_err(UpstreamError::Recv)?;
            if n == 0 {
                break;
            }
            if raw.len() + n > self.max_response_bytes {
                return Err(UpstreamError::TooLarge(self.max_response_bytes));
            }
            raw.extend_from_slice(&chunk[..n]);
        }

        let response = parse_response(&raw)?;
        tracing::debug!(
            host = %host,
            status = response.status,
            bytes = response.body.len(),
            "upstream response received"
        );
        Ok(response)
    }
}

fn parse_response(raw: &[u8]) -> Result<HttpResponse, UpstreamError> {
    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(UpstreamError::Parse)?;
    let head = std::str::from_utf8(&raw[..header_end]).map_err(|_| UpstreamError::Parse)?;

    let status_line = head.lines().next().ok_or(UpstreamError::Parse)?;
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or(UpstreamError::Parse)?;

    if status == 403 {
        return Err(UpstreamError::Forbidden);
    }

    let chunked = head.lines().skip(1).any(|line| {
        match line.split_once(':') {
            Some((name, value)) => {
                name.trim().eq_ignore_ascii_case("transfer-encoding")
                    && value.to_ascii_lowercase().contains("chunked")
            }
            None => false,
        }
    });

    let payload = &raw[header_end + 4..];
    let body = if chunked {
        decode_chunked(payload)?
    } else {
        payload.to_vec()
    };

    Ok(HttpResponse { status, body })
}

/// Decode a chunked transfer encoding: hex-size lines, chunk data,
/// terminated by a zero-length chunk. Trailers are ignored.
fn decode_chunked(mut payload: &[u8]) -> Result<Vec<u8>, UpstreamError> {
    let mut body = Vec::with_capacity(payload.len());
    loop {
        let line_end = payload
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or(UpstreamError::Parse)?;
        let size_line = std::str::from_utf8(&payload[..line_end]).map_err(|_| UpstreamError::Parse)?;
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_token, 16).map_err(|_| UpstreamError::Parse)?;

        if size == 0 {
            return Ok(body);
        }

        let data_start = line_end + 2;
        let data_end = data_start + size;
        if payload.len() < data_end + 2 {
            return Err(UpstreamError::Parse);
        }
        body.extend_from_slice(&payload[data_start..data_end]);
        if &payload[data_end..data_end + 2] != b"\r\n" {
            return Err(UpstreamError::Parse);
        }
        payload = &payload[data_end + 2..];
    }
}
