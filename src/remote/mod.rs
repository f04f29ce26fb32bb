pub mod memory;
pub mod store;
pub mod table;

pub use memory::{InMemoryRemoteStore, RemoteCall};
pub use store::{RemoteOp, RemoteStore};
pub use table::{TableId, TableKind, remote_table_name};
