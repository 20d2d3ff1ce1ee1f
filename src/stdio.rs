//! Stdin/stdout JSON line bridge for [`SearchFusionServer`].
//!
//! Reads newline-delimited JSON [`Request`]s, runs each one on its own task,
//! and writes one [`Response`] line per request. Responses may therefore
//! arrive out of order; callers correlate them by `id`. The search gate and
//! the server's fetch limit provide backpressure, so the reader never
//! blocks on slow searches or fetches.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{FusionError, Result};
use crate::protocol::{Request, Response, Tool};
use crate::server::SearchFusionServer;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on the process's stdin and stdout until EOF or a
/// `shutdown` request.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or stdout cannot be written.
pub async fn run_stdio_bridge(server: Arc<SearchFusionServer>) -> Result<()> {
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Run the bridge over arbitrary streams.
///
/// In-flight requests are allowed to finish before this returns. A
/// `shutdown` request is acknowledged after they have.
///
/// # Errors
///
/// Returns an error if `reader` fails or a response cannot be written.
pub async fn serve<R, W>(server: Arc<SearchFusionServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(writer)));
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let mut lines = reader.lines();
    let mut shutdown: Option<Request> = None;

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| FusionError::Protocol(format!("failed to read request line: {e}")))?;
        let Some(line) = line else {
            tracing::info!("stdin closed (EOF); shutting down stdio bridge");
            break;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse request line");
                let response = Response::parse_error(format!("failed to parse request: {e}"));
                send(&writer, &response).await?;
                continue;
            }
        };

        if Tool::parse(&request.tool) == Some(Tool::Shutdown) {
            tracing::info!("shutdown requested; draining in-flight requests");
            shutdown = Some(request);
            break;
        }

        let server = Arc::clone(&server);
        let task_writer = Arc::clone(&writer);
        in_flight.spawn(async move {
            let response = server.handle(request).await;
            if let Err(e) = send(&task_writer, &response).await {
                tracing::warn!(error = %e, tool = %response.tool, "failed to write response");
            }
        });

        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }

    if let Some(request) = shutdown {
        let response = server.handle(request).await;
        send(&writer, &response).await?;
    }
    Ok(())
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "request task failed");
    }
}

async fn send<W>(writer: &SharedWriter<W>, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)
        .map_err(|e| FusionError::Protocol(format!("failed to serialize response: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut w, &json).await
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line<W>(writer: &mut BufWriter<W>, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| FusionError::Protocol(format!("failed to write response: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| FusionError::Protocol(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| FusionError::Protocol(format!("failed to flush output: {e}")))?;
    Ok(())
}
