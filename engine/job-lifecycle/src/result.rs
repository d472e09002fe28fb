//! Drained query results

use std::io;

use futures::StreamExt;

use crate::client::ResultChunks;
use crate::job::ResultFormat;

/// Read a result body to the end.
///
/// The whole body is drained before any row is handed out, so a transport
/// failure half way never leaves partial output behind.
pub async fn drain(mut chunks: ResultChunks) -> io::Result<String> {
    let mut body = Vec::new();
    while let Some(chunk) = chunks.next().await {
        body.extend_from_slice(&chunk?);
    }

    String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Rows of a finished job, consumed once.
#[derive(Debug)]
pub struct ResultStream {
    format: ResultFormat,
    body: String,
    offset: usize,
}

impl ResultStream {
    pub fn new(format: ResultFormat, body: String) -> Self {
        Self { format, body, offset: 0 }
    }

    pub fn format(&self) -> ResultFormat {
        self.format
    }

    /// Bytes of the body not yet handed out as rows
    pub fn remaining(&self) -> usize {
        self.body.len() - self.offset
    }
}

impl Iterator for ResultStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.offset >= self.body.len() {
            return None;
        }

        let rest = &self.body[self.offset..];
        let (line, consumed) = match rest.find('\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.offset += consumed;

        Some(line.strip_suffix('\r').unwrap_or(line).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn rows(body: &str) -> Vec<String> {
        ResultStream::new(ResultFormat::Csv, body.to_string()).collect()
    }

    #[test]
    fn test_rows_split_on_newlines() {
        assert_eq!(rows("a,1\nb,2\n"), vec!["a,1", "b,2"]);
        assert_eq!(rows("a,1\r\nb,2"), vec!["a,1", "b,2"]);
        assert_eq!(rows("a\n\nb\n"), vec!["a", "", "b"]);
        assert!(rows("").is_empty());
    }

    #[test]
    fn test_stream_is_not_restartable() {
        let mut stream = ResultStream::new(ResultFormat::Tabular, "x\ty\n".to_string());
        assert_eq!(stream.next().as_deref(), Some("x\ty"));
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.next(), None);
        assert_eq!(stream.next(), None);
    }

    #[tokio::test]
    async fn test_drain_concatenates_chunks() {
        let chunks: ResultChunks =
            Box::pin(stream::iter(vec![Ok(b"a,1\nb".to_vec()), Ok(b",2\n".to_vec())]));
        assert_eq!(drain(chunks).await.unwrap(), "a,1\nb,2\n");
    }

    #[tokio::test]
    async fn test_drain_surfaces_transport_errors() {
        let chunks: ResultChunks = Box::pin(stream::iter(vec![
            Ok(b"a,1\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ]));
        let err = drain(chunks).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_drain_rejects_invalid_utf8() {
        let chunks: ResultChunks = Box::pin(stream::iter(vec![Ok(vec![0xff, 0xfe])]));
        let err = drain(chunks).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
