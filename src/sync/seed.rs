use super::document::document_row;
use crate::baseline::{BaselineDataset, BaselineEntry};
use crate::connection::ModeGate;
use crate::core::{Entity, Result, Row, SyncError, to_row};
use crate::remote::TableId;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// The marker table already had rows; nothing was written
    pub skipped: bool,
    pub seeded: Vec<TableId>,
    pub failed: Vec<(TableId, String)>,
}

impl SeedReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One-time bulk load of the baseline into an empty remote store.
///
/// Idempotent: the marker table decides. Tables are written independently,
/// so one failing table does not stop the others. The marker table is
/// written last, which leaves an interrupted seed retryable.
pub struct SeedCoordinator {
    gate: Arc<ModeGate>,
    baseline: Arc<BaselineDataset>,
    marker: TableId,
}

impl SeedCoordinator {
    pub fn new(gate: Arc<ModeGate>, baseline: Arc<BaselineDataset>, marker: TableId) -> Self {
        if baseline.collection(marker).is_empty() {
            warn!(
                "baseline has no '{}' rows; seeding will rerun on every call",
                marker
            );
        }
        Self {
            gate,
            baseline,
            marker,
        }
    }

    pub fn marker(&self) -> TableId {
        self.marker
    }

    pub async fn seed_if_empty(&self) -> Result<SeedReport> {
        let populated = self
            .gate
            .remote()?
            .has_rows(self.marker)
            .await
            .map_err(|err| SyncError::SeedFailure {
                table: self.marker.to_string(),
                message: format!("marker check failed: {}", err),
            })?;
        if populated {
            debug!("marker table '{}' has rows, skipping seed", self.marker);
            return Ok(SeedReport::skipped());
        }

        info!("marker table '{}' is empty, seeding baseline", self.marker);
        let mut report = SeedReport::default();

        let entries: Vec<_> = self
            .ordered_entries()
            .into_iter()
            .filter(|entry| !entry.is_empty())
            .collect();

        for (position, entry) in entries.iter().enumerate() {
            let table = entry.table();

            // The session may have ended while the previous table was written.
            let remote = match self.gate.remote() {
                Ok(remote) => remote,
                Err(err) => {
                    warn!("seeding interrupted before '{}': {}", table, err);
                    report.failed.extend(
                        entries[position..]
                            .iter()
                            .map(|pending| (pending.table(), err.to_string())),
                    );
                    break;
                }
            };

            let rows = match entry_rows(*entry) {
                Ok(rows) => rows,
                Err(err) => {
                    report.failed.push((table, err.to_string()));
                    continue;
                }
            };

            let count = rows.len();
            match remote.upsert_many(table, rows).await {
                Ok(()) => {
                    debug!("seeded {} row(s) into '{}'", count, table.remote_name());
                    report.seeded.push(table);
                }
                Err(err) => {
                    let failure = SyncError::SeedFailure {
                        table: table.to_string(),
                        message: err.to_string(),
                    };
                    warn!("{}; continuing with remaining tables", failure);
                    report.failed.push((table, err.to_string()));
                }
            }
        }

        info!(
            "seeding finished: {} table(s) written, {} failed",
            report.seeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn ordered_entries(&self) -> Vec<BaselineEntry<'_>> {
        let (mut entries, marker): (Vec<_>, Vec<_>) = self
            .baseline
            .entries()
            .partition(|entry| entry.table() != self.marker);
        entries.extend(marker);
        entries
    }
}

fn entry_rows(entry: BaselineEntry<'_>) -> Result<Vec<Row>> {
    match entry {
        BaselineEntry::Collection(_, entities) => entities.iter().map(to_row::<Entity>).collect(),
        BaselineEntry::Document(_, fields) => Ok(vec![document_row(fields)?]),
    }
}
