use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

use crate::error::{Error, Result};

pub(super) const MAX_LINE_BYTES: usize = 8 * 1024;

/// Reads one CRLF (or bare LF) terminated line, returning it without the
/// terminator. End of stream before the terminator is a malformed message;
/// cache files always carry complete messages.
pub(super) async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut collected = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if collected.is_empty() {
                return Err(Error::InvalidMessage("unexpected end of stream".into()));
            }
            return Err(Error::InvalidMessage("truncated line".into()));
        }

        let newline = available.iter().position(|byte| *byte == b'\n');
        let consume = newline.map(|idx| idx + 1).unwrap_or(available.len());

        if collected.len() + consume > MAX_LINE_BYTES {
            return Err(Error::InvalidMessage(format!(
                "line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }

        collected.extend_from_slice(&available[..consume]);
        reader.consume(consume);

        if newline.is_some() {
            break;
        }
    }

    let mut line = String::from_utf8(collected)
        .map_err(|_| Error::InvalidMessage("line contains invalid utf-8".into()))?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strips_crlf_terminator() {
        let mut input: &[u8] = b"GET / HTTP/1.1\r\nrest";
        assert_eq!(read_line(&mut input).await.unwrap(), "GET / HTTP/1.1");
        assert_eq!(input, b"rest");
    }

    #[tokio::test]
    async fn accepts_bare_lf() {
        let mut input: &[u8] = b"header: value\n";
        assert_eq!(read_line(&mut input).await.unwrap(), "header: value");
    }

    #[tokio::test]
    async fn empty_line_is_empty_string() {
        let mut input: &[u8] = b"\r\n";
        assert_eq!(read_line(&mut input).await.unwrap(), "");
    }

    #[tokio::test]
    async fn eof_before_terminator_is_invalid() {
        let mut input: &[u8] = b"partial";
        let err = read_line(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let long = vec![b'a'; MAX_LINE_BYTES + 1];
        let mut input: &[u8] = &long;
        let err = read_line(&mut input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }
}
