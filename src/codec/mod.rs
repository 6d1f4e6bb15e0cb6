//! On-disk encoding of HTTP request/response pairs.
//!
//! Each message is written as a self-contained HTTP/1.1 wire message:
//! start line, CRLF-separated header fields, empty line, then the body
//! framed by `Content-Length`. Decoding also accepts chunked transfer
//! encoding and, for responses, bodies that run to end of stream, so
//! files produced by other HTTP tooling remain readable.

mod body;
mod headers;
mod line;
mod request;
mod response;

pub use request::{decode_request, encode_request};
pub use response::{decode_response, encode_response};

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// An [`AsyncWrite`] adapter that counts the bytes accepted by the inner
/// writer. The cache engine uses it to account an entry's on-disk size
/// while encoding.
pub struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match Pin::new(&mut self.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                self.bytes += written as u64;
                Poll::Ready(Ok(written))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
