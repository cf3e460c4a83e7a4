/// Backup module
///
/// This module handles:
/// - The tagged archive container (archive.rs)
/// - Exporting and restoring the full store (codec.rs)
/// - Storage statistics (stats.rs)

pub mod archive;
pub mod codec;
pub mod stats;

pub use archive::TaggedArchive;
pub use codec::{
    export_all, export_to_path, import_all, import_from_path, ImportOptions, ImportReport,
    Manifest,
};
pub use stats::{format_size, stats, StorageStats};
