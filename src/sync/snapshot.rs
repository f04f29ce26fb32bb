use crate::core::{Fingerprint, Record, Result, SyncError};
use crate::remote::TableId;
use std::collections::HashMap;

/// Full value of a collection at one point in time.
///
/// Each entity is indexed by id together with its content fingerprint, so a
/// snapshot serves both as the rollback target of a mutation and as the diff
/// baseline without serializing its entities again.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    items: Vec<T>,
    index: HashMap<String, (usize, Fingerprint)>,
}

impl<T: Record> Snapshot<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Indexes `items`, rejecting blank or duplicate ids.
    pub fn build(table: TableId, items: Vec<T>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let id = item.record_id();
            if id.trim().is_empty() {
                return Err(SyncError::MissingId(table.to_string()));
            }
            let fingerprint = Fingerprint::of(item)?;
            if index.insert(id.to_string(), (position, fingerprint)).is_some() {
                return Err(SyncError::DuplicateId {
                    table: table.to_string(),
                    id: id.to_string(),
                });
            }
        }
        Ok(Self { items, index })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index
            .get(id)
            .and_then(|(position, _)| self.items.get(*position))
    }

    pub fn fingerprint(&self, id: &str) -> Option<Fingerprint> {
        self.index.get(id).map(|(_, fingerprint)| *fingerprint)
    }
}

impl<T: Record> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Remote writes needed to move from one snapshot to another
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    /// New entities, or entities whose content changed, in new-collection order
    pub to_upsert: Vec<T>,
    /// Ids that disappeared, in old-collection order
    pub to_delete: Vec<String>,
}

impl<T> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.to_upsert.is_empty() && self.to_delete.is_empty()
    }
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            to_upsert: Vec::new(),
            to_delete: Vec::new(),
        }
    }
}

/// Whole-collection diff between two snapshots
pub fn diff<T: Record>(old: &Snapshot<T>, new: &Snapshot<T>) -> ChangeSet<T> {
    let to_upsert = new
        .items
        .iter()
        .filter(|item| {
            let id = item.record_id();
            old.fingerprint(id) != new.fingerprint(id)
        })
        .cloned()
        .collect();

    let to_delete = old
        .items
        .iter()
        .map(Record::record_id)
        .filter(|id| !new.contains(id))
        .map(str::to_string)
        .collect();

    ChangeSet {
        to_upsert,
        to_delete,
    }
}

/// Convenience form of [`diff`] over plain collections
pub fn diff_collections<T: Record>(table: TableId, old: &[T], new: &[T]) -> Result<ChangeSet<T>> {
    let old = Snapshot::build(table, old.to_vec())?;
    let new = Snapshot::build(table, new.to_vec())?;
    Ok(diff(&old, &new))
}
