// ============================================================================
// Baseline Dataset
// ============================================================================
//
// Static default data. It is the initial state of every store in Local mode
// and the seed written to an empty remote store.
//
// ============================================================================

use crate::core::{Entity, Fields, Result, SyncError};
use crate::remote::TableId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const EMBEDDED_BASELINE: &str = include_str!("../../data/baseline.json");

/// One table's worth of baseline data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineEntry<'a> {
    Collection(TableId, &'a [Entity]),
    Document(TableId, &'a Fields),
}

impl BaselineEntry<'_> {
    pub fn table(&self) -> TableId {
        match self {
            BaselineEntry::Collection(table, _) | BaselineEntry::Document(table, _) => *table,
        }
    }

    /// True for a collection without entities; documents are never empty
    pub fn is_empty(&self) -> bool {
        match self {
            BaselineEntry::Collection(_, entities) => entities.is_empty(),
            BaselineEntry::Document(..) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineDataset {
    #[serde(default)]
    collections: BTreeMap<TableId, Vec<Entity>>,
    #[serde(default)]
    documents: BTreeMap<TableId, Fields>,
}

impl BaselineDataset {
    /// Dataset compiled into the binary from `data/baseline.json`
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_BASELINE)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: BaselineDataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replaces the baseline of one collection table
    pub fn with_collection(mut self, table: TableId, entities: Vec<Entity>) -> Result<Self> {
        Self::check_collection(table, &entities)?;
        self.collections.insert(table, entities);
        Ok(self)
    }

    /// Replaces the baseline of one document table
    pub fn with_document(mut self, table: TableId, fields: Fields) -> Result<Self> {
        if !table.is_document() {
            return Err(SyncError::Config(format!(
                "'{}' is not a document table",
                table
            )));
        }
        self.documents.insert(table, fields);
        Ok(self)
    }

    /// Baseline entities of a collection; empty when none are defined
    pub fn collection(&self, table: TableId) -> &[Entity] {
        self.collections
            .get(&table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn document(&self, table: TableId) -> Option<&Fields> {
        self.documents.get(&table)
    }

    /// Every collection and document entry, collections first
    pub fn entries(&self) -> impl Iterator<Item = BaselineEntry<'_>> {
        let collections = self
            .collections
            .iter()
            .map(|(table, entities)| BaselineEntry::Collection(*table, entities.as_slice()));
        let documents = self
            .documents
            .iter()
            .map(|(table, fields)| BaselineEntry::Document(*table, fields));
        collections.chain(documents)
    }

    pub fn entity_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn validate(&self) -> Result<()> {
        for (table, entities) in &self.collections {
            Self::check_collection(*table, entities)?;
        }
        for table in self.documents.keys() {
            if !table.is_document() {
                return Err(SyncError::Config(format!(
                    "baseline lists '{}' as a document but it is a collection",
                    table
                )));
            }
        }
        Ok(())
    }

    fn check_collection(table: TableId, entities: &[Entity]) -> Result<()> {
        if table.is_document() {
            return Err(SyncError::Config(format!(
                "'{}' is a document table, not a collection",
                table
            )));
        }

        let mut seen = HashSet::with_capacity(entities.len());
        for entity in entities {
            if entity.id.trim().is_empty() {
                return Err(SyncError::MissingId(table.to_string()));
            }
            if !seen.insert(entity.id.as_str()) {
                return Err(SyncError::DuplicateId {
                    table: table.to_string(),
                    id: entity.id.clone(),
                });
            }
        }
        Ok(())
    }
}
