//! Storage Layer
//!
//! In-memory alert history and reading inbox with repository pattern.

mod inbox;
mod repository;

pub use inbox::InboxSource;
pub use repository::{AlertRecord, Repository};

use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Alert {0} not found")]
    AlertNotFound(Uuid),
}
