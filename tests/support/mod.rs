#![allow(dead_code)]

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use tracing_subscriber::EnvFilter;

/// Installs a compact subscriber once so `RUST_LOG=httpstash=trace`
/// surfaces engine activity when a test is run by hand.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// A GET request fixture with a small body, so stores exercise both
/// files' bodies.
pub fn sample_request(host: &str, path: &str) -> Request<Bytes> {
    Request::builder()
        .method("GET")
        .uri(format!("http://{host}{path}"))
        .header("host", host)
        .header("accept", "*/*")
        .header("content-type", "text/plain")
        .body(Bytes::from_static(b"ping"))
        .expect("build request fixture")
}

pub fn sample_response(body: impl Into<Bytes>) -> Response<Bytes> {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .header("cache-control", "max-age=60")
        .body(body.into())
        .expect("build response fixture")
}

/// A binary blob with CRLF pairs, NUL bytes, and high bits set, shaped
/// like a small PNG: the worst case for a text-framed encoding.
pub fn binary_body() -> Bytes {
    let mut body = Vec::new();
    body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    for i in 0..2048u32 {
        body.extend_from_slice(&i.to_be_bytes());
        if i % 37 == 0 {
            body.extend_from_slice(b"\r\n\r\n");
        }
    }
    body.extend_from_slice(&[0x00, 0xff, 0x00, 0xff]);
    Bytes::from(body)
}
