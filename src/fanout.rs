//! Source fan-out orchestrator.
//!
//! [`Orchestrator::query`] submits the compiled filters to every known
//! source concurrently and streams [`FanoutEvent`]s back:
//!
//! | Event | When |
//! |-------|------|
//! | `Record` | A source delivered a record (sources race; order unspecified) |
//! | `SourceComplete` | A source finished, failed, or timed out (once per source) |
//! | `AllComplete` | Completed count reached queried count (once per attempt) |
//!
//! Sources registered while the attempt is running are queried
//! incrementally. A source id is queried at most once per attempt, even if
//! it is re-registered. With no known sources `AllComplete` fires
//! immediately.
//!
//! Each source runs in its own task under a timeout. A failing, hanging,
//! or panicking source still produces exactly one `SourceComplete`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use passage_core::models::{ContentRecord, Filter};

use crate::source::{RecordSink, Source, SourceRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Completed { records: usize },
    Failed { error: String },
    TimedOut,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub enum FanoutEvent {
    Record {
        source: String,
        record: ContentRecord,
    },
    SourceComplete {
        source: String,
        outcome: SourceOutcome,
    },
    AllComplete {
        /// Source ids in the order they were queried.
        queried: Vec<String>,
        failed: Vec<String>,
    },
}

/// Cancels one fan-out. Safe to call repeatedly and after completion.
#[derive(Debug, Clone)]
pub struct FanoutHandle {
    cancel: CancellationToken,
}

impl FanoutHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: SourceRegistry,
    source_timeout: Duration,
}

impl Orchestrator {
    pub fn new(registry: SourceRegistry, source_timeout: Duration) -> Self {
        Self {
            registry,
            source_timeout,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Start a fan-out with its own cancellation token.
    pub fn query(&self, filters: Vec<Filter>) -> (FanoutHandle, mpsc::UnboundedReceiver<FanoutEvent>) {
        self.query_with_token(filters, CancellationToken::new())
    }

    /// Start a fan-out governed by `cancel`, typically a child of the
    /// search attempt's token.
    pub fn query_with_token(
        &self,
        filters: Vec<Filter>,
        cancel: CancellationToken,
    ) -> (FanoutHandle, mpsc::UnboundedReceiver<FanoutEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            filters: filters.into(),
            tx,
            cancel: cancel.clone(),
            source_timeout: self.source_timeout,
        };
        tokio::spawn(driver.run(self.registry.clone()));
        (FanoutHandle { cancel }, rx)
    }
}

struct Driver {
    filters: Arc<[Filter]>,
    tx: mpsc::UnboundedSender<FanoutEvent>,
    cancel: CancellationToken,
    source_timeout: Duration,
}

/// Sends a failure completion if the source task ends without reporting,
/// e.g. on panic or abort.
struct CompletionGuard {
    source: String,
    done: Option<mpsc::UnboundedSender<(String, SourceOutcome)>>,
}

impl CompletionGuard {
    fn finish(mut self, outcome: SourceOutcome) {
        if let Some(done) = self.done.take() {
            let _ = done.send((self.source.clone(), outcome));
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send((
                self.source.clone(),
                SourceOutcome::Failed {
                    error: "source task ended without completing".to_string(),
                },
            ));
        }
    }
}

impl Driver {
    async fn run(self, registry: SourceRegistry) {
        let mut sources_rx = registry.subscribe();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queried: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut completed = 0usize;
        let mut registry_open = true;

        let initial = sources_rx.borrow_and_update().clone();
        for source in initial {
            self.spawn_source(source, &mut seen, &mut queried, &mut tasks, &done_tx);
        }

        loop {
            if completed == queried.len() {
                let _ = self.tx.send(FanoutEvent::AllComplete { queried, failed });
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(queried = queried.len(), completed, "fan-out cancelled");
                    tasks.abort_all();
                    return;
                }
                _ = self.tx.closed() => {
                    tasks.abort_all();
                    return;
                }
                changed = sources_rx.changed(), if registry_open => {
                    if changed.is_err() {
                        registry_open = false;
                        continue;
                    }
                    let current = sources_rx.borrow_and_update().clone();
                    for source in current {
                        self.spawn_source(source, &mut seen, &mut queried, &mut tasks, &done_tx);
                    }
                }
                Some((source, outcome)) = done_rx.recv() => {
                    completed += 1;
                    match &outcome {
                        SourceOutcome::Completed { records } => {
                            debug!(source = %source, records, "source complete");
                        }
                        SourceOutcome::Failed { error } => {
                            warn!(source = %source, error = %error, "source failed");
                            failed.push(source.clone());
                        }
                        SourceOutcome::TimedOut => {
                            warn!(source = %source, timeout = ?self.source_timeout, "source timed out");
                            failed.push(source.clone());
                        }
                    }
                    let _ = self.tx.send(FanoutEvent::SourceComplete { source, outcome });
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
    }

    fn spawn_source(
        &self,
        source: Arc<dyn Source>,
        seen: &mut HashSet<String>,
        queried: &mut Vec<String>,
        tasks: &mut JoinSet<()>,
        done_tx: &mpsc::UnboundedSender<(String, SourceOutcome)>,
    ) {
        let id = source.id().to_string();
        if !seen.insert(id.clone()) {
            return;
        }
        queried.push(id.clone());
        debug!(source = %id, "querying source");

        let delivered = Arc::new(AtomicUsize::new(0));
        let sink = RecordSink::new(
            id.clone(),
            self.tx.clone(),
            self.cancel.clone(),
            delivered.clone(),
        );
        let guard = CompletionGuard {
            source: id,
            done: Some(done_tx.clone()),
        };
        let filters = self.filters.clone();
        let timeout = self.source_timeout;

        tasks.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, source.query(&filters, sink)).await {
                Ok(Ok(())) => SourceOutcome::Completed {
                    records: delivered.load(Ordering::Relaxed),
                },
                Ok(Err(e)) => SourceOutcome::Failed {
                    error: format!("{:#}", e),
                },
                Err(_) => SourceOutcome::TimedOut,
            };
            guard.finish(outcome);
        });
    }
}
