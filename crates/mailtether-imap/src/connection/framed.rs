//! Line and literal framing.
//!
//! Responses are CRLF-terminated lines, except that a line ending in a
//! `{n}` literal marker is followed by exactly `n` raw bytes and then the
//! rest of the response.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::response::Response;
use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Longest line accepted before the connection is treated as hostile.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted. Header FETCHes are far below this.
pub const MAX_LITERAL_SIZE: usize = 16 * 1024 * 1024;

/// Buffered, response-oriented wrapper around a byte stream.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(256),
        }
    }

    /// Reads one complete response, including any embedded literals.
    ///
    /// # Errors
    ///
    /// Returns an I/O error on EOF, or [`Error::Protocol`] when a line or
    /// literal exceeds the size limits.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {len} bytes exceeds limit of {MAX_LITERAL_SIZE}"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response)
    }

    /// Reads and parses the next response.
    ///
    /// # Errors
    ///
    /// Propagates read and parse failures.
    pub async fn next_response(&mut self) -> Result<Response> {
        let raw = self.read_response().await?;
        Response::parse(&raw)
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                if line.ends_with(b"\r\n") {
                    return Ok(line);
                }
                // bare LF inside a line; keep reading
                continue;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol(format!(
                    "line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
        }
    }

    /// Writes `data` and flushes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);
        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Unwraps the stream, discarding anything still buffered.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Parses a trailing `{n}\r\n` or `{n+}\r\n` literal marker.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"* 1 FETCH (BODY[] {42}\r\n"), Some(42));
        assert_eq!(literal_length(b"{7+}\r\n"), Some(7));
        assert_eq!(literal_length(b"* OK done\r\n"), None);
        assert_eq!(literal_length(b"{12}"), None);
        assert_eq!(literal_length(b"{x1}\r\n"), None);
        assert_eq!(literal_length(b"{}\r\n"), None);
    }

    proptest! {
        #[test]
        fn literal_length_roundtrips_any_size(n in 0usize..10_000_000) {
            let line = format!("* 3 FETCH (BODY[HEADER] {{{n}}}\r\n");
            prop_assert_eq!(literal_length(line.as_bytes()), Some(n));
        }

        #[test]
        fn lines_without_marker_have_no_literal(s in "[a-zA-Z0-9 ()*]{0,64}") {
            let line = format!("{s}\r\n");
            prop_assert_eq!(literal_length(line.as_bytes()), None);
        }
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK IMAP4rev1 ready\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK IMAP4rev1 ready\r\n");
    }

    #[tokio::test]
    async fn test_read_split_across_packets() {
        let mock = Builder::new().read(b"* 3 EXI").read(b"STS\r\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* 3 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[HEADER.FIELDS (SUBJECT)] {14}\r\n")
            .read(b"Subject: x\r\n\r\n)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let raw = framed.read_response().await.unwrap();
        assert!(raw.ends_with(b"Subject: x\r\n\r\n)\r\n"));
    }

    #[tokio::test]
    async fn test_oversized_literal_rejected() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_eof_is_connection_lost() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_all(b"A0001 NOOP\r\n").await.unwrap();
    }
}
