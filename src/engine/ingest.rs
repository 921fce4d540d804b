// src/engine/ingest.rs

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RuntimeEvent;
use crate::catalog::FileEntry;
use crate::dispatch::EngineEvent;

/// Read arrivals as JSON lines (one [`FileEntry`] per line) and forward
/// them to the runtime. Unparseable lines are logged and skipped.
///
/// At end of input, asks the runtime to shut down if `shutdown_on_eof`.
pub fn spawn_line_ingest<R>(
    reader: R,
    tx: mpsc::Sender<RuntimeEvent>,
    shutdown_on_eof: bool,
) -> JoinHandle<usize>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        let mut forwarded = 0usize;
        let mut line_no = 0usize;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "reading arrivals failed; stopping ingest");
                    break;
                }
            };
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let entry: FileEntry = match serde_json::from_str(trimmed) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(line = line_no, error = %err, "skipping malformed arrival");
                    continue;
                }
            };
            debug!(uuid = %entry.uuid, source = %entry.source, "arrival read");
            if tx
                .send(RuntimeEvent::Dispatch(EngineEvent::Arrival(entry)))
                .await
                .is_err()
            {
                debug!("runtime gone; stopping ingest");
                return forwarded;
            }
            forwarded += 1;
        }

        info!(forwarded, "end of arrival input");
        if shutdown_on_eof {
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        }
        forwarded
    })
}
