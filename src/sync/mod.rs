pub mod activity;
pub mod collection;
pub mod document;
pub mod registry;
pub mod seed;
pub mod snapshot;
pub mod store;

pub use activity::{ActivityEntry, ActivityLogger, ActivityStats};
pub use collection::CollectionStore;
pub use document::{DOCUMENT_KEY, DocumentStore, document_row};
pub use registry::StoreRegistry;
pub use seed::{SeedCoordinator, SeedReport};
pub use snapshot::{ChangeSet, Snapshot, diff, diff_collections};
pub use store::{LoadOutcome, ManagedStore, MutationReport, StoreStats};
