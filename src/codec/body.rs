use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncReadExt};

use crate::error::{Error, Result};

use super::line::read_line;

/// How the body of a decoded message is delimited.
pub(super) enum BodyFraming {
    /// `Content-Length` was present.
    Length(u64),
    /// `Transfer-Encoding: chunked` was present.
    Chunked,
    /// Responses without framing headers run to end of stream.
    ToEnd,
    /// Requests without framing headers carry no body.
    Empty,
}

pub(super) async fn read_body<R>(reader: &mut R, framing: BodyFraming) -> Result<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    match framing {
        BodyFraming::Empty => Ok(Bytes::new()),
        BodyFraming::Length(length) => {
            let mut body = vec![0u8; length as usize];
            fill_exact(reader, &mut body, "body shorter than Content-Length").await?;
            Ok(Bytes::from(body))
        }
        BodyFraming::ToEnd => {
            let mut body = Vec::new();
            reader.read_to_end(&mut body).await?;
            Ok(Bytes::from(body))
        }
        BodyFraming::Chunked => read_chunked(reader).await,
    }
}

async fn read_chunked<R>(reader: &mut R) -> Result<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let line = read_line(reader).await?;
        // Chunk extensions after ';' are tolerated and ignored.
        let size_str = line.split(';').next().unwrap_or("").trim();
        let size = u64::from_str_radix(size_str, 16)
            .map_err(|_| Error::InvalidMessage(format!("invalid chunk size {size_str:?}")))?;
        if size == 0 {
            break;
        }
        let start = body.len();
        body.resize(start + size as usize, 0);
        fill_exact(reader, &mut body[start..], "truncated chunk data").await?;
        let mut crlf = [0u8; 2];
        fill_exact(reader, &mut crlf, "truncated chunk terminator").await?;
        if &crlf != b"\r\n" {
            return Err(Error::InvalidMessage(
                "chunk data not followed by CRLF".into(),
            ));
        }
    }
    // Trailer section: consume up to the final empty line.
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
    }
    Ok(Bytes::from(body))
}

async fn fill_exact<R>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    reader.read_exact(buf).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::InvalidMessage(what.to_string())
        } else {
            Error::Io(err)
        }
    })?;
    Ok(())
}
