//! Write-through cache warmer.
//!
//! The search engine never writes to the cache itself. When
//! `[cache] write_through` is on, it hands every record delivered by a live
//! source to a [`CacheWarmer`], which stores them from a background task so
//! slow cache writes never stall delivery.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use passage_core::cache::CacheStore;
use passage_core::models::ContentRecord;

enum Msg {
    Put { source: String, record: ContentRecord },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct CacheWarmer {
    tx: mpsc::UnboundedSender<Msg>,
}

impl CacheWarmer {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(cache: Arc<dyn CacheStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Put { source, record } => {
                        if let Err(e) = cache.put_record(&record, &source).await {
                            warn!(record = %record.id, source = %source, error = %e, "cache write failed");
                        }
                    }
                    Msg::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    /// Queue `record` for storage, attributed to `source`.
    pub fn offer(&self, source: &str, record: &ContentRecord) {
        let _ = self.tx.send(Msg::Put {
            source: source.to_string(),
            record: record.clone(),
        });
    }

    /// Wait until every record offered so far has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
