/// Storage statistics for the settings screen

use crate::error::Result;
use crate::state::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub container_count: usize,
    pub photo_count: usize,
    /// Image plus thumbnail bytes over every photo
    pub total_bytes: u64,
    /// Human-readable `total_bytes`. Approximate: database overhead,
    /// indexes and compression are not counted.
    pub approximate_size: String,
}

pub fn stats(store: &dyn RecordStore) -> Result<StorageStats> {
    let total_bytes = store.total_blob_bytes()?;
    Ok(StorageStats {
        container_count: store.count_containers()?,
        photo_count: store.count_photos()?,
        total_bytes,
        approximate_size: format_size(total_bytes),
    })
}

/// Bytes below 1 KiB, then KB and MB with one decimal
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
