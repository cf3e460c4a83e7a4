/// Error types shared by every layer of the inventory.
///
/// Validation errors are meant to be shown to the user as-is; everything
/// else propagates to the caller of the failing operation.

use crate::ident::IdError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, InventoryError>;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// User-typed or scanned container id is not canonical
    #[error(transparent)]
    Validation(#[from] IdError),

    #[error("record with id {0} already exists")]
    DuplicateId(String),

    #[error("no record with id {0}")]
    NotFound(String),

    /// A record handed to a store breaks the data model (e.g. `updatedAt` before `createdAt`)
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Archive is missing one of its required entries
    #[error("invalid backup file: {0}")]
    InvalidArchive(String),

    /// An archive entry does not parse as the expected shape
    #[error("malformed backup data: {0}")]
    MalformedData(String),

    /// The image processor could not decode its input
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Remote backend could not be reached
    #[error("remote backend unavailable: {0}")]
    Unavailable(String),

    #[error("not authenticated")]
    Unauthenticated,

    /// Remote backend was reached but refused the write or query
    #[error("remote backend rejected the request: {0}")]
    Rejected(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    /// True for the persistence failures that are always fatal to the current operation
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_) | Self::Rejected(_))
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedData(err.to_string())
    }
}
