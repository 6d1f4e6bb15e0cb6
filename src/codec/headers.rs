use http::HeaderMap;
use http::header::{CONTENT_LENGTH, HeaderName, HeaderValue, TRANSFER_ENCODING};
use tokio::io::AsyncBufRead;

use crate::error::{Error, Result};

use super::line::read_line;

const MAX_HEADER_BYTES: usize = 64 * 1024;

/// A parsed header block plus the framing facts the body reader needs.
#[derive(Debug)]
pub(super) struct MessageHeaders {
    pub map: HeaderMap,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// Reads header lines up to and including the empty line that ends the
/// block, with a bounded total size.
pub(super) async fn read_headers<R>(reader: &mut R) -> Result<MessageHeaders>
where
    R: AsyncBufRead + Unpin,
{
    let mut map = HeaderMap::new();
    let mut content_length = None;
    let mut chunked = false;
    let mut total = 0usize;

    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
        total += line.len();
        if total > MAX_HEADER_BYTES {
            return Err(Error::InvalidMessage(format!(
                "header block exceeds {MAX_HEADER_BYTES} bytes"
            )));
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidMessage(format!("header missing ':' separator: {line:?}")))?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return Err(Error::InvalidMessage("header name must not be empty".into()));
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidMessage(format!("invalid header name {name:?}")))?;
        let parsed = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidMessage(format!("invalid value for header {name}")))?;

        if name == CONTENT_LENGTH {
            let length = value
                .parse::<u64>()
                .map_err(|_| Error::InvalidMessage(format!("invalid Content-Length {value:?}")))?;
            if let Some(existing) = content_length
                && existing != length
            {
                return Err(Error::InvalidMessage(
                    "conflicting Content-Length headers".into(),
                ));
            }
            content_length = Some(length);
        } else if name == TRANSFER_ENCODING
            && value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
        {
            chunked = true;
        }

        map.append(name, parsed);
    }

    Ok(MessageHeaders {
        map,
        content_length,
        chunked,
    })
}

/// Appends the header block and terminating empty line to `buf`.
///
/// Framing headers are normalized: `Transfer-Encoding` is dropped (the
/// body is always written measured) and `Content-Length` is re-emitted
/// from the actual body length. A zero-length body only gets an explicit
/// `Content-Length` if the original message carried one, so header sets
/// survive a round trip unchanged.
pub(super) fn write_header_block(buf: &mut Vec<u8>, headers: &HeaderMap, body_len: usize) {
    let had_content_length = headers.contains_key(CONTENT_LENGTH);
    for (name, value) in headers {
        if *name == CONTENT_LENGTH || *name == TRANSFER_ENCODING {
            continue;
        }
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    if body_len > 0 || had_content_length {
        buf.extend_from_slice(b"content-length: ");
        buf.extend_from_slice(body_len.to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_headers_and_framing() {
        let mut input: &[u8] =
            b"Content-Type: text/plain\r\nContent-Length: 5\r\nX-Custom: a, b\r\n\r\nbody!";
        let headers = read_headers(&mut input).await.unwrap();
        assert_eq!(headers.map["content-type"], "text/plain");
        assert_eq!(headers.map["x-custom"], "a, b");
        assert_eq!(headers.content_length, Some(5));
        assert!(!headers.chunked);
        assert_eq!(input, b"body!");
    }

    #[tokio::test]
    async fn detects_chunked_transfer() {
        let mut input: &[u8] = b"Transfer-Encoding: gzip, Chunked\r\n\r\n";
        let headers = read_headers(&mut input).await.unwrap();
        assert!(headers.chunked);
    }

    #[tokio::test]
    async fn repeated_header_values_are_kept() {
        let mut input: &[u8] = b"Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n";
        let headers = read_headers(&mut input).await.unwrap();
        let values: Vec<_> = headers.map.get_all("set-cookie").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn rejects_missing_separator() {
        let mut input: &[u8] = b"not-a-header\r\n\r\n";
        let err = read_headers(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn rejects_conflicting_content_length() {
        let mut input: &[u8] = b"Content-Length: 5\r\nContent-Length: 6\r\n\r\n";
        let err = read_headers(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn write_skips_content_length_for_empty_body() {
        let mut buf = Vec::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-a", "1".parse().unwrap());
        write_header_block(&mut buf, &headers, 0);
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("content-length"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
