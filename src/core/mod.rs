pub mod error;
pub mod types;

pub use error::{Result, SyncError};
pub use types::{Entity, Fields, Fingerprint, ID_FIELD, Record, Row, from_row, row_id, to_row};
