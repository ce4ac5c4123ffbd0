pub mod error;
pub mod types;

pub use error::{ApiError, Result, SyncError};
pub use types::{EntityId, SyncEntity};
