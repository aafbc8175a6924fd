//! Stdin/stdout line loop for the host protocol.
//!
//! Reads newline-delimited JSON [`HostRequest`](super::contract::HostRequest)
//! lines and writes one JSON [`HostResponse`] line per request.
//!
//! Stdout is exclusively reserved for the protocol; all diagnostic output
//! goes to the log file.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{HookError, Result};
use crate::host::contract::HostResponse;
use crate::host::proxy::SearchProxy;

/// Serve requests from stdin until EOF, or after one request if `once`.
///
/// # Errors
///
/// Returns an error only when stdin or stdout fail.
pub async fn run_stdio(proxy: &SearchProxy, once: bool) -> Result<usize> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    serve(proxy, reader, writer, once).await
}

/// Serve requests from `reader`, answering on `writer`.
///
/// Blank lines are skipped. Returns the number of requests answered.
///
/// # Errors
///
/// Returns an error when reading or writing fails.
pub async fn serve<R, W>(proxy: &SearchProxy, mut reader: R, mut writer: W, once: bool) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    let mut answered = 0;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        // EOF
        if bytes_read == 0 {
            tracing::info!(answered, "stdin closed (EOF); shutting down");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = proxy.handle_line(trimmed).await;
        write_response(&mut writer, &response).await?;
        answered += 1;

        if once {
            break;
        }
    }

    Ok(answered)
}

/// Write a single JSON line and flush.
async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &HostResponse) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| HookError::Config(format!("failed to serialize response: {e}")))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::AppConfig;
    use serde_json::Value;

    fn proxy() -> SearchProxy {
        SearchProxy::new(&AppConfig::default()).expect("proxy")
    }

    fn lines(out: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect()
    }

    #[tokio::test]
    async fn answers_every_line_until_eof() {
        let input = b"{\"path\": [\"db\"], \"query\": {}}\n\nnot json\n" as &[u8];
        let mut out = Vec::new();

        let answered = serve(&proxy(), input, &mut out, false).await.unwrap();

        assert_eq!(answered, 2);
        let replies = lines(&out);
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r["code"] == 400));
    }

    #[tokio::test]
    async fn once_stops_after_first_request() {
        let input = b"{}\n{}\n" as &[u8];
        let mut out = Vec::new();

        let answered = serve(&proxy(), input, &mut out, true).await.unwrap();

        assert_eq!(answered, 1);
        assert_eq!(lines(&out).len(), 1);
    }

    #[tokio::test]
    async fn empty_input_answers_nothing() {
        let mut out = Vec::new();
        let answered = serve(&proxy(), b"" as &[u8], &mut out, false).await.unwrap();
        assert_eq!(answered, 0);
        assert!(out.is_empty());
    }
}
