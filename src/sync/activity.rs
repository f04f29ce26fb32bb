use crate::connection::ModeGate;
use crate::core::{Record, Result, SyncError, to_row};
use crate::remote::TableId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

/// One audit trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub detail: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl ActivityEntry {
    pub fn new(actor: &str, action: &str, detail: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            detail: detail.to_string(),
            at: Utc::now().to_rfc3339(),
        }
    }
}

impl Record for ActivityEntry {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityStats {
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum Command {
    Record(ActivityEntry),
    Flush(oneshot::Sender<()>),
}

/// Append-only, best-effort audit trail.
///
/// A single background task owns all writes; `record` only enqueues. Failed
/// writes are logged and dropped, never reported back to the mutation that
/// produced them.
pub struct ActivityLogger {
    sender: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl ActivityLogger {
    /// Starts the writer task. Must be called inside a tokio runtime.
    pub fn spawn(gate: Arc<ModeGate>) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        tokio::spawn(run_writer(receiver, gate, Arc::clone(&counters)));
        Arc::new(Self { sender, counters })
    }

    /// Queues an entry; never blocks and never fails
    pub fn record(&self, actor: &str, action: &str, detail: &str) {
        let entry = ActivityEntry::new(actor, action, detail);
        if self.sender.send(Command::Record(entry)).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("activity writer stopped, dropping entry '{}'", action);
        }
    }

    /// Waits until every entry queued so far has been processed
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run_writer(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    gate: Arc<ModeGate>,
    counters: Arc<Counters>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Record(entry) => match write_entry(&gate, &entry).await {
                Ok(()) => {
                    counters.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(SyncError::RemoteUnavailable(mode)) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("activity entry '{}' dropped in {} mode", entry.action, mode);
                }
                Err(err) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "{}",
                        SyncError::LogFailure(format!("entry '{}' by '{}': {}", entry.action, entry.actor, err))
                    );
                }
            },
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn write_entry(gate: &ModeGate, entry: &ActivityEntry) -> Result<()> {
    let remote = gate.remote()?;
    let row = to_row(entry)?;
    remote.upsert_many(TableId::ActivityLog, vec![row]).await
}
