//! Per-connection lifecycle.
//!
//! Every accepted socket serves exactly one request: read the header
//! block, parse, dispatch, send, close. Each sequential phase runs
//! under the configured timeout; a phase that overruns closes the
//! connection without a response.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::Instrument;
use uuid::Uuid;

use super::request::{Request, RequestError};
use super::response::Response;
use crate::error::{self, ErrorResponse};
use crate::routes::{self, Route};
use crate::AppState;
use crate::{cities, surprise};

/// Fixed capacity of the request read buffer.
const READ_BUF_SIZE: usize = 8 * 1024;

pub async fn serve(stream: TcpStream, peer: SocketAddr, state: Arc<AppState>) {
    let span = tracing::debug_span!("conn", id = %Uuid::new_v4(), peer = %peer);
    handle(stream, state).instrument(span).await
}

async fn handle(mut stream: TcpStream, state: Arc<AppState>) {
    let phase_timeout = Duration::from_secs(state.config.connection_timeout_secs);

    let head = match timeout(phase_timeout, read_head(&mut stream)).await {
        Err(_) => {
            tracing::debug!("connection timed out while reading");
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "read failed");
            return;
        }
        Ok(Ok(ReadOutcome::Closed)) => {
            tracing::trace!("peer closed before completing a request");
            return;
        }
        Ok(Ok(ReadOutcome::Overflow)) => {
            let response = error::to_response(&RequestError::TooLarge);
            let _ = timeout(phase_timeout, send(&mut stream, response)).await;
            return;
        }
        Ok(Ok(ReadOutcome::Head(head))) => head,
    };

    let response = match Request::parse(&head) {
        Ok(request) => {
            tracing::debug!(method = ?request.method, target = %request.raw_target, "request received");
            match timeout(phase_timeout, dispatch(&request, &state)).await {
                Ok(response) => response,
                Err(_) => {
                    // Timeout closes the connection without a response;
                    // any in-flight upstream fetch is dropped with it.
                    tracing::debug!(path = %request.path, "dispatch timed out");
                    return;
                }
            }
        }
        Err(e) => error::to_response(&e),
    };

    match timeout(phase_timeout, send(&mut stream, response)).await {
        Err(_) => tracing::debug!("connection timed out while sending"),
        Ok(Err(e)) => tracing::debug!(error = %e, "send failed"),
        Ok(Ok(())) => {}
    }
}

enum ReadOutcome {
    /// Full header block, terminator included.
    Head(Vec<u8>),
    /// Peer closed before the header block completed.
    Closed,
    /// Buffer filled without a header terminator.
    Overflow,
}

async fn read_head(stream: &mut TcpStream) -> std::io::Result<ReadOutcome> {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut filled = 0;
    loop {
        if let Some(end) = header_end(&buf[..filled]) {
            buf.truncate(end);
            return Ok(ReadOutcome::Head(buf));
        }
        if filled == buf.len() {
            return Ok(ReadOutcome::Overflow);
        }
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        filled += n;
    }
}

/// Offset one past the `\r\n\r\n` terminator, if present.
fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

async fn dispatch(request: &Request, state: &AppState) -> Response {
    match routes::resolve(request.method, &request.path) {
        Route::Preflight => Response::preflight(),
        Route::Health => Response::json(200, br#"{"status":"ok"}"#.to_vec()),
        Route::Cities => Response::json(200, cities::cities_json()),
        Route::Surprise => surprise::serve(Path::new(&state.config.surprise_dir)).await,
        Route::Weather => match request.query_param("city") {
            Some(city) if !city.trim().is_empty() => match state.weather.lookup(city).await {
                Ok(body) => Response::json(200, body.into_bytes()),
                Err(e) => error::to_response(&e),
            },
            _ => Response::json(
                400,
                ErrorResponse::new("missing query parameter: city").to_bytes(),
            ),
        },
        Route::NotFound => Response::json(404, ErrorResponse::new("Not found").to_bytes()),
    }
}

async fn send(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    let status = response.status();
    let bytes = response.into_bytes();
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    tracing::debug!(status, bytes = bytes.len(), "response sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_end() {
        assert_eq!(header_end(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(header_end(b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody"), Some(27));
        assert_eq!(header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
        assert_eq!(header_end(b""), None);
    }
}
