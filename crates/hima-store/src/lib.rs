//! Local device storage for hima
//!
//! Provides:
//! - The registered user identity
//! - Notification settings
//! - JSON backup export and import of both

mod backup;
mod sqlite;
mod traits;

pub use backup::*;
pub use sqlite::*;
pub use traits::*;

use hima_util::HimaError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for HimaError {
    fn from(e: StoreError) -> Self {
        HimaError::store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
