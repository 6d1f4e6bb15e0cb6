use bytes::Bytes;
use http::header::HOST;
use http::{Method, Request, Uri, Version};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

use super::body::{BodyFraming, read_body};
use super::headers::{read_headers, write_header_block};
use super::line::read_line;

/// Writes `req` as an HTTP/1.1 request message: request line, headers,
/// empty line, body. A `Host` header is synthesized from the URI
/// authority when the request does not carry one, so the encoded message
/// stands alone.
pub async fn encode_request<W>(req: &Request<Bytes>, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(req.method().as_str().as_bytes());
    head.push(b' ');
    head.extend_from_slice(target.as_bytes());
    head.extend_from_slice(b" HTTP/1.1\r\n");
    if !req.headers().contains_key(HOST)
        && let Some(authority) = req.uri().authority()
    {
        head.extend_from_slice(b"host: ");
        head.extend_from_slice(authority.as_str().as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    write_header_block(&mut head, req.headers(), req.body().len());

    writer.write_all(&head).await?;
    writer.write_all(req.body()).await?;
    writer.flush().await?;
    Ok(())
}

/// Parses one HTTP/1.1 request message from `reader`.
///
/// The body is delimited by `Content-Length` or chunked transfer
/// encoding; a request with neither has no body.
pub async fn decode_request<R>(reader: &mut R) -> Result<Request<Bytes>>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let mut parts = line.splitn(3, ' ');
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version)) => (method, target, version),
        _ => {
            return Err(Error::InvalidMessage(format!(
                "malformed request line {line:?}"
            )));
        }
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| Error::InvalidMessage(format!("invalid method {method:?}")))?;
    let uri = target
        .parse::<Uri>()
        .map_err(|_| Error::InvalidMessage(format!("invalid request target {target:?}")))?;
    let version = parse_version(version)?;

    let headers = read_headers(reader).await?;
    let framing = if headers.chunked {
        BodyFraming::Chunked
    } else if let Some(length) = headers.content_length {
        BodyFraming::Length(length)
    } else {
        BodyFraming::Empty
    };
    let body = read_body(reader, framing).await?;

    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .version(version)
        .body(body)
        .map_err(|err| Error::InvalidMessage(err.to_string()))?;
    *req.headers_mut() = headers.map;
    Ok(req)
}

pub(super) fn parse_version(token: &str) -> Result<Version> {
    match token {
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        other => Err(Error::InvalidMessage(format!(
            "unsupported HTTP version {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn encode(req: &Request<Bytes>) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_request(req, &mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn encodes_request_line_and_host() {
        let req = Request::builder()
            .method("GET")
            .uri("http://example.com/foo?a=1")
            .body(Bytes::new())
            .unwrap();
        let text = String::from_utf8(encode(&req).await).unwrap();
        assert!(text.starts_with("GET /foo?a=1 HTTP/1.1\r\n"));
        assert!(text.contains("host: example.com\r\n"));
    }

    #[tokio::test]
    async fn explicit_host_header_is_not_duplicated() {
        let req = Request::builder()
            .method("GET")
            .uri("http://127.0.0.1/foo")
            .header("host", "example.com")
            .body(Bytes::new())
            .unwrap();
        let text = String::from_utf8(encode(&req).await).unwrap();
        assert_eq!(text.matches("host").count(), 1);
        assert!(text.contains("host: example.com\r\n"));
    }

    #[tokio::test]
    async fn decodes_request_with_body() {
        let mut input: &[u8] =
            b"POST /submit HTTP/1.1\r\nhost: example.com\r\ncontent-length: 4\r\n\r\ndata";
        let req = decode_request(&mut input).await.unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri().path(), "/submit");
        assert_eq!(req.headers()["host"], "example.com");
        assert_eq!(&req.body()[..], b"data");
    }

    #[tokio::test]
    async fn request_without_framing_has_empty_body() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nhost: example.com\r\n\r\n";
        let req = decode_request(&mut input).await.unwrap();
        assert!(req.body().is_empty());
    }

    #[tokio::test]
    async fn rejects_malformed_request_line() {
        let mut input: &[u8] = b"NOT-HTTP\r\n\r\n";
        let err = decode_request(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_version() {
        let mut input: &[u8] = b"GET / HTTP/3.0\r\n\r\n";
        let err = decode_request(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }
}
