//! HTTP/1.1 response construction.
//!
//! Every response is single-shot: `Connection: close` is always sent and
//! the socket is shut down after the body. CORS headers go on every
//! response so browser clients can call the API directly.

/// A response waiting to be serialized onto the socket.
#[derive(Debug)]
pub struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    preflight: bool,
}

impl Response {
    pub fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
            preflight: false,
        }
    }

    pub fn with_content_type(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            preflight: false,
        }
    }

    /// CORS pre-flight answer for OPTIONS requests.
    pub fn preflight() -> Self {
        Self {
            status: 204,
            content_type: "application/json",
            body: Vec::new(),
            preflight: true,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Serialize status line, headers and body into wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status)).as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n", self.content_type).as_bytes());
        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        out.extend_from_slice(b"Connection: close\r\n");
        out.extend_from_slice(b"Access-Control-Allow-Origin: *\r\n");
        out.extend_from_slice(b"Access-Control-Allow-Methods: GET, OPTIONS\r\n");
        if self.preflight {
            out.extend_from_slice(b"Access-Control-Allow-Headers: Content-Type\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        _ => "Internal Server Error",
    }
}
