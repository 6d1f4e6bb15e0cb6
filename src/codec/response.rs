use bytes::Bytes;
use http::{Response, StatusCode};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

use super::body::{BodyFraming, read_body};
use super::headers::{read_headers, write_header_block};
use super::line::read_line;
use super::request::parse_version;

/// Writes `res` as an HTTP/1.1 response message: status line with the
/// canonical reason phrase, headers, empty line, body.
pub async fn encode_response<W>(res: &Response<Bytes>, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let status = res.status();
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(b"HTTP/1.1 ");
    head.extend_from_slice(status.as_str().as_bytes());
    if let Some(reason) = status.canonical_reason() {
        head.push(b' ');
        head.extend_from_slice(reason.as_bytes());
    }
    head.extend_from_slice(b"\r\n");
    write_header_block(&mut head, res.headers(), res.body().len());

    writer.write_all(&head).await?;
    writer.write_all(res.body()).await?;
    writer.flush().await?;
    Ok(())
}

/// Parses one HTTP/1.1 response message from `reader`.
///
/// The body is delimited by `Content-Length` or chunked transfer
/// encoding; without either it runs to end of stream, which for a cache
/// file is the end of the entry.
pub async fn decode_response<R>(reader: &mut R) -> Result<Response<Bytes>>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let mut parts = line.splitn(3, ' ');
    let (version, code) = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) => (version, code),
        _ => {
            return Err(Error::InvalidMessage(format!(
                "malformed status line {line:?}"
            )));
        }
    };
    let version = parse_version(version)?;
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| Error::InvalidMessage(format!("invalid status code {code:?}")))?;

    let headers = read_headers(reader).await?;
    let framing = if headers.chunked {
        BodyFraming::Chunked
    } else if let Some(length) = headers.content_length {
        BodyFraming::Length(length)
    } else {
        BodyFraming::ToEnd
    };
    let body = read_body(reader, framing).await?;

    let mut res = Response::builder()
        .status(status)
        .version(version)
        .body(body)
        .map_err(|err| Error::InvalidMessage(err.to_string()))?;
    *res.headers_mut() = headers.map;
    Ok(res)
}
