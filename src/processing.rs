use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task;
use tracing::{error, info, warn};

use crate::decoder::BlockDecoder;
use crate::file_reader::BlockStream;

/// Totals for one block file decoded start to finish.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub blocks: usize,
    pub transactions: usize,
    pub segwit_transactions: usize,
    /// Offset just past the last decoded record.
    pub bytes: usize,
    /// First decode error, after which the rest of the file was skipped.
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Decodes a whole file on the calling thread with its own cursor.
pub fn summarize_file(path: PathBuf, decoder: BlockDecoder) -> FileSummary {
    let start_time = Instant::now();
    let mut summary = FileSummary {
        path: path.clone(),
        blocks: 0,
        transactions: 0,
        segwit_transactions: 0,
        bytes: 0,
        error: None,
        elapsed: Duration::ZERO,
    };

    for result in BlockStream::new(Some(path), decoder) {
        match result {
            Ok(block) => {
                summary.blocks += 1;
                summary.transactions += block.transaction_count();
                summary.segwit_transactions +=
                    block.transactions.iter().filter(|tx| tx.has_witness).count();
                summary.bytes = block.next_offset;
            }
            Err(e) => {
                summary.error = Some(e.to_string());
                break;
            }
        }
    }

    summary.elapsed = start_time.elapsed();
    summary
}

/// Decodes files concurrently, at most `jobs` at a time, one cursor per file.
///
/// Summaries arrive on `tx` in completion order, not file order.
pub async fn scan_files(
    paths: Vec<PathBuf>,
    decoder: BlockDecoder,
    jobs: usize,
    tx: mpsc::Sender<FileSummary>,
) {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

    stream::iter(paths)
        .for_each_concurrent(None, |path| {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let decoder = decoder.clone();
            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                info!(file = %path.display(), "processing file");
                match task::spawn_blocking(move || summarize_file(path, decoder)).await {
                    Ok(summary) => {
                        if let Some(e) = &summary.error {
                            warn!(file = %summary.path.display(), error = %e, "file stopped early");
                        }
                        if tx.send(summary).await.is_err() {
                            warn!("summary receiver dropped");
                        }
                    }
                    Err(e) => error!(error = %e, "file task failed"),
                }
            }
        })
        .await;
}
