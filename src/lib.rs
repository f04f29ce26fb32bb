// ============================================================================
// SyncDeck Library
// ============================================================================

pub mod baseline;
pub mod connection;
pub mod core;
pub mod facade;
pub mod remote;
pub mod sync;

// Re-export main types for convenience
pub use baseline::{BaselineDataset, BaselineEntry};
pub use core::{Entity, Fields, Fingerprint, Record, Result, Row, SyncError};
pub use facade::{SyncEngine, SyncReport};
pub use remote::{InMemoryRemoteStore, RemoteOp, RemoteStore, TableId, TableKind};

// Re-export connection API
pub use connection::{
    Authenticator, Credentials, ModeGate, PasswordAuthenticator, Session, SyncConfig, SyncMode,
};

// Re-export store API
pub use sync::{
    ActivityEntry, ActivityLogger, ChangeSet, CollectionStore, DocumentStore, LoadOutcome,
    ManagedStore, MutationReport, SeedCoordinator, SeedReport, Snapshot, StoreRegistry,
    StoreStats,
};
