/// Backup export and restore
///
/// An archive holds four compartments:
/// - `manifest.json`: version tag, export time and record counts
/// - `database.json`: every container, plus every photo without its blobs
/// - `photos/<photoId>.<ext>`: full-resolution images
/// - `thumbs/<photoId>.<ext>`: thumbnails
///
/// The photo id is the join key between `database.json` and the two folders.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::archive::{image_extension, TaggedArchive};
use crate::error::{InventoryError, Result};
use crate::state::data::now_millis;
use crate::state::{Container, Photo, PhotoMeta, RecordStore};

/// Version tag written into every manifest
pub const ARCHIVE_VERSION: &str = "1.0.0";

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const DATABASE_ENTRY: &str = "database.json";
pub const PHOTOS_FOLDER: &str = "photos";
pub const THUMBS_FOLDER: &str = "thumbs";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub app_version: String,
    /// Milliseconds since the epoch
    pub export_date: i64,
    pub container_count: usize,
    pub photo_count: usize,
}

impl Manifest {
    fn major_version(&self) -> &str {
        self.app_version.split('.').next().unwrap_or_default()
    }
}

/// Contents of `database.json`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEntry {
    pub containers: Vec<Container>,
    pub photos: Vec<PhotoMeta>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Reject archives whose manifest major version differs from ours
    pub enforce_manifest_version: bool,
}

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub manifest: Manifest,
    pub containers_restored: usize,
    pub photos_restored: usize,
    /// Ids of photos left out because their blobs or container were missing
    pub skipped_photos: Vec<String>,
}

/// A fully validated archive, ready to replace the store contents
struct Restore {
    manifest: Manifest,
    containers: Vec<Container>,
    photos: Vec<Photo>,
    skipped_photos: Vec<String>,
}

/// Snapshot the whole store into an archive
pub fn build_archive(store: &dyn RecordStore) -> Result<TaggedArchive> {
    let containers = store.list_containers()?;
    let photos = store.list_photos()?;

    let manifest = Manifest {
        app_version: ARCHIVE_VERSION.to_string(),
        export_date: now_millis(),
        container_count: containers.len(),
        photo_count: photos.len(),
    };
    let database = DatabaseEntry {
        containers,
        photos: photos.iter().map(Photo::meta).collect(),
    };

    let mut archive = TaggedArchive::new();
    archive.insert(MANIFEST_ENTRY, serde_json::to_vec_pretty(&manifest)?);
    archive.insert(DATABASE_ENTRY, serde_json::to_vec_pretty(&database)?);
    for photo in photos {
        let image_name = format!(
            "{}/{}.{}",
            PHOTOS_FOLDER,
            photo.id,
            image_extension(&photo.image_blob)
        );
        let thumb_name = format!(
            "{}/{}.{}",
            THUMBS_FOLDER,
            photo.id,
            image_extension(&photo.thumbnail_blob)
        );
        archive.insert(image_name, photo.image_blob);
        archive.insert(thumb_name, photo.thumbnail_blob);
    }

    tracing::info!(
        "export built: {} containers, {} photos",
        manifest.container_count,
        manifest.photo_count
    );
    Ok(archive)
}

/// Export the whole store as archive bytes
pub fn export_all(store: &dyn RecordStore) -> Result<Vec<u8>> {
    build_archive(store)?.to_bytes()
}

/// Replace the whole store with the contents of `bytes`
pub fn import_all(
    store: &mut dyn RecordStore,
    bytes: &[u8],
    options: ImportOptions,
) -> Result<ImportReport> {
    let archive = TaggedArchive::from_bytes(bytes)?;
    restore_archive(store, &archive, options)
}

/// Validate `archive` and replace the store contents with it.
///
/// Nothing is written until the archive has been fully validated. Photos
/// whose image or thumbnail is missing, or whose container is not in the
/// archive, are skipped rather than failing the restore.
pub fn restore_archive(
    store: &mut dyn RecordStore,
    archive: &TaggedArchive,
    options: ImportOptions,
) -> Result<ImportReport> {
    let restore = prepare_restore(archive, options)?;
    apply_restore(store, restore)
}

fn prepare_restore(archive: &TaggedArchive, options: ImportOptions) -> Result<Restore> {
    let manifest_bytes = archive
        .get(MANIFEST_ENTRY)
        .ok_or_else(|| InventoryError::InvalidArchive(format!("missing {}", MANIFEST_ENTRY)))?;
    let database_bytes = archive
        .get(DATABASE_ENTRY)
        .ok_or_else(|| InventoryError::InvalidArchive(format!("missing {}", DATABASE_ENTRY)))?;

    let manifest: Manifest = serde_json::from_slice(manifest_bytes)?;
    if options.enforce_manifest_version {
        let ours = ARCHIVE_VERSION.split('.').next().unwrap_or_default();
        if manifest.major_version() != ours {
            return Err(InventoryError::InvalidArchive(format!(
                "unsupported backup version {}",
                manifest.app_version
            )));
        }
    }

    let database: DatabaseEntry = serde_json::from_slice(database_bytes)?;
    for container in &database.containers {
        container.check().map_err(|e| {
            InventoryError::MalformedData(format!("container {:?}: {}", container.id, e))
        })?;
    }

    let images = archive.folder_index(PHOTOS_FOLDER);
    let thumbs = archive.folder_index(THUMBS_FOLDER);
    let container_ids: HashSet<&str> = database.containers.iter().map(|c| c.id.as_str()).collect();

    let mut photos = Vec::with_capacity(database.photos.len());
    let mut skipped_photos = Vec::new();
    for meta in database.photos {
        if !container_ids.contains(meta.container_id.as_str()) {
            tracing::warn!(
                "photo {} references unknown container {}, skipping",
                meta.id,
                meta.container_id
            );
            skipped_photos.push(meta.id);
            continue;
        }
        match (images.get(meta.id.as_str()), thumbs.get(meta.id.as_str())) {
            (Some(image), Some(thumb)) => {
                let (image, thumb) = (image.to_vec(), thumb.to_vec());
                photos.push(meta.with_blobs(image, thumb));
            }
            _ => {
                tracing::warn!("missing photo files for {}, skipping", meta.id);
                skipped_photos.push(meta.id);
            }
        }
    }

    Ok(Restore {
        manifest,
        containers: database.containers,
        photos,
        skipped_photos,
    })
}

fn apply_restore(store: &mut dyn RecordStore, restore: Restore) -> Result<ImportReport> {
    store.replace_all(&restore.containers, &restore.photos)?;

    tracing::info!(
        "import complete: {} containers, {} photos, {} skipped",
        restore.containers.len(),
        restore.photos.len(),
        restore.skipped_photos.len()
    );

    Ok(ImportReport {
        manifest: restore.manifest,
        containers_restored: restore.containers.len(),
        photos_restored: restore.photos.len(),
        skipped_photos: restore.skipped_photos,
    })
}

/// Run blocking store work without stalling the async worker.
///
/// `block_in_place` needs the multi-threaded runtime; on a current-thread
/// runtime the work runs inline.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Export the store to a file
pub async fn export_to_path(store: &dyn RecordStore, path: impl AsRef<Path>) -> Result<()> {
    let bytes = run_blocking(|| export_all(store))?;
    tokio::fs::write(path.as_ref(), bytes).await?;
    tracing::info!("backup written to {}", path.as_ref().display());
    Ok(())
}

/// Restore the store from a file.
///
/// Decoding and validation run on the blocking pool; the replace itself
/// runs under the caller's exclusive borrow of `store`.
pub async fn import_from_path(
    store: &mut dyn RecordStore,
    path: impl AsRef<Path>,
    options: ImportOptions,
) -> Result<ImportReport> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    let restore = tokio::task::spawn_blocking(move || {
        let archive = TaggedArchive::from_bytes(&bytes)?;
        prepare_restore(&archive, options)
    })
    .await
    .map_err(|e| {
        InventoryError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Task join error: {}", e),
        ))
    })??;
    run_blocking(|| apply_restore(store, restore))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SqliteStore;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn container(id: &str, updated_at: i64) -> Container {
        Container {
            id: id.into(),
            label: format!("Box {}", id),
            location: "Attic".into(),
            notes: Some("winter clothes".into()),
            created_at: 1,
            updated_at,
        }
    }

    fn photo(id: &str, container_id: &str, size: usize) -> Photo {
        let mut image_blob = JPEG_MAGIC.to_vec();
        image_blob.resize(size, 7);
        Photo {
            id: id.into(),
            container_id: container_id.into(),
            description: Some(format!("photo {}", id)),
            image_blob,
            thumbnail_blob: JPEG_MAGIC.to_vec(),
            created_at: 100,
        }
    }

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_container(&container("C-AB12", 20)).unwrap();
        store.create_container(&container("C-CD34", 10)).unwrap();
        store.create_photo(&photo("p1", "C-AB12", 1000)).unwrap();
        store.create_photo(&photo("p2", "C-AB12", 2000)).unwrap();
        store.create_photo(&photo("p3", "C-CD34", 3000)).unwrap();
        store
    }

    #[test]
    fn test_round_trip_restores_everything() {
        let source = seeded();
        let bytes = export_all(&source).unwrap();

        let mut target = SqliteStore::open_in_memory().unwrap();
        target.create_container(&container("C-OLD1", 99)).unwrap();
        let report = import_all(&mut target, &bytes, ImportOptions::default()).unwrap();

        assert_eq!(report.manifest.app_version, ARCHIVE_VERSION);
        assert_eq!(report.manifest.container_count, 2);
        assert_eq!(report.containers_restored, 2);
        assert_eq!(report.photos_restored, 3);
        assert!(report.skipped_photos.is_empty());
        assert_eq!(target.list_containers().unwrap(), source.list_containers().unwrap());
        assert_eq!(target.list_photos().unwrap(), source.list_photos().unwrap());
        assert!(target.get_container("C-OLD1").unwrap().is_none());
    }

    #[test]
    fn test_archive_layout() {
        let archive = build_archive(&seeded()).unwrap();
        for name in [
            "manifest.json",
            "database.json",
            "photos/p1.jpg",
            "photos/p2.jpg",
            "photos/p3.jpg",
            "thumbs/p1.jpg",
            "thumbs/p3.jpg",
        ] {
            assert!(archive.get(name).is_some(), "missing {}", name);
        }

        let manifest: Manifest =
            serde_json::from_slice(archive.get(MANIFEST_ENTRY).unwrap()).unwrap();
        assert_eq!(manifest.container_count, 2);
        assert_eq!(manifest.photo_count, 3);
        assert_eq!(manifest.app_version, ARCHIVE_VERSION);

        let database: serde_json::Value =
            serde_json::from_slice(archive.get(DATABASE_ENTRY).unwrap()).unwrap();
        let first_photo = &database["photos"][0];
        assert!(first_photo.get("containerId").is_some());
        assert!(first_photo.get("imageBlob").is_none());
    }

    #[test]
    fn test_missing_thumbnail_skips_only_that_photo() {
        let mut archive = build_archive(&seeded()).unwrap();
        archive.remove("thumbs/p2.jpg").unwrap();

        let mut target = SqliteStore::open_in_memory().unwrap();
        let report = restore_archive(&mut target, &archive, ImportOptions::default()).unwrap();

        assert_eq!(report.skipped_photos, vec!["p2".to_string()]);
        assert_eq!(target.count_containers().unwrap(), 2);
        assert_eq!(target.count_photos().unwrap(), 2);
        assert!(target.get_photo("p2").unwrap().is_none());
        assert!(target.get_photo("p1").unwrap().is_some());
    }

    #[test]
    fn test_missing_required_entries() {
        for entry in [MANIFEST_ENTRY, DATABASE_ENTRY] {
            let mut archive = build_archive(&seeded()).unwrap();
            archive.remove(entry);

            let mut target = seeded();
            let err = restore_archive(&mut target, &archive, ImportOptions::default()).unwrap_err();
            assert!(matches!(err, InventoryError::InvalidArchive(_)));
            // Validation failed before anything was cleared
            assert_eq!(target.count_photos().unwrap(), 3);
        }
    }

    #[test]
    fn test_malformed_database_entry() {
        let mut archive = build_archive(&seeded()).unwrap();
        archive.insert(DATABASE_ENTRY, br#"{"containers": "nope"}"#.to_vec());

        let mut target = seeded();
        let err = restore_archive(&mut target, &archive, ImportOptions::default()).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedData(_)));
        assert_eq!(target.count_containers().unwrap(), 2);
    }

    #[test]
    fn test_broken_container_records_fail_before_writing() {
        let records = [
            r#"{"id":"not a valid id!!","label":"Box","location":"","createdAt":500,"updatedAt":5}"#,
            r#"{"id":"C-EF56","label":"Box","location":"","createdAt":500,"updatedAt":5}"#,
        ];
        for record in records {
            let mut archive = build_archive(&seeded()).unwrap();
            archive.insert(
                DATABASE_ENTRY,
                format!(r#"{{"containers":[{}],"photos":[]}}"#, record).into_bytes(),
            );

            let mut target = seeded();
            let err = restore_archive(&mut target, &archive, ImportOptions::default()).unwrap_err();
            assert!(matches!(err, InventoryError::MalformedData(_)), "{}", record);
            assert_eq!(target.count_containers().unwrap(), 2);
            assert_eq!(target.count_photos().unwrap(), 3);
            assert!(target.get_container("C-EF56").unwrap().is_none());
        }
    }

    /// Backup shaped like the ones written by the browser build of the app:
    /// ZIP, explicit folder entries, every blob named `.jpg`
    fn browser_backup() -> Vec<u8> {
        let manifest = r#"{
  "appVersion": "1.0.0",
  "exportDate": 1718000000000,
  "containerCount": 1,
  "photoCount": 2
}"#;
        let database = r#"{
  "containers": [
    {"id": "C-AB12", "label": "Tools", "location": "Garage", "notes": "sockets",
     "createdAt": 1717000000000, "updatedAt": 1717500000000}
  ],
  "photos": [
    {"id": "photo-1-abc", "containerId": "C-AB12", "description": "red hammer", "createdAt": 1717000000500},
    {"id": "photo-2-def", "containerId": "C-AB12", "createdAt": 1717000000600}
  ]
}"#;
        let files: [(&str, &[u8]); 6] = [
            ("manifest.json", manifest.as_bytes()),
            ("database.json", database.as_bytes()),
            ("photos/photo-1-abc.jpg", &[0xFF, 0xD8, 0xFF, 0xE0, 1]),
            ("thumbs/photo-1-abc.jpg", &[0xFF, 0xD8, 0xFF, 0xE0, 2]),
            ("photos/photo-2-def.jpg", b"\x89PNG\r\n\x1a\n...."),
            ("thumbs/photo-2-def.jpg", b"\x89PNG\r\n\x1a\n.."),
        ];

        let options = SimpleFileOptions::default();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("photos/", options).unwrap();
        writer.add_directory("thumbs/", options).unwrap();
        for (name, bytes) in files {
            writer.start_file(name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_restores_browser_zip_backup() {
        let mut target = seeded();
        let report = import_all(&mut target, &browser_backup(), ImportOptions::default()).unwrap();

        assert_eq!(report.manifest.export_date, 1718000000000);
        assert_eq!(report.containers_restored, 1);
        assert_eq!(report.photos_restored, 2);
        assert!(report.skipped_photos.is_empty());

        let tools = target.get_container("C-AB12").unwrap().unwrap();
        assert_eq!(tools.notes.as_deref(), Some("sockets"));
        assert_eq!(tools.updated_at, 1717500000000);
        assert!(target.get_container("C-CD34").unwrap().is_none());

        let hammer = target.get_photo("photo-1-abc").unwrap().unwrap();
        assert_eq!(hammer.description.as_deref(), Some("red hammer"));
        assert_eq!(hammer.thumbnail_blob, vec![0xFF, 0xD8, 0xFF, 0xE0, 2]);
        let second = target.get_photo("photo-2-def").unwrap().unwrap();
        assert_eq!(second.description, None);
        assert_eq!(target.count_photos_by_container("C-AB12").unwrap(), 2);
    }

    #[test]
    fn test_orphan_photo_metadata_is_skipped() {
        let mut archive = build_archive(&seeded()).unwrap();
        let mut database: DatabaseEntry =
            serde_json::from_slice(archive.get(DATABASE_ENTRY).unwrap()).unwrap();
        database.containers.retain(|c| c.id != "C-CD34");
        archive.insert(DATABASE_ENTRY, serde_json::to_vec(&database).unwrap());

        let mut target = SqliteStore::open_in_memory().unwrap();
        let report = restore_archive(&mut target, &archive, ImportOptions::default()).unwrap();
        assert_eq!(report.skipped_photos, vec!["p3".to_string()]);
        assert_eq!(target.count_photos().unwrap(), 2);
    }

    #[test]
    fn test_version_gate_is_opt_in() {
        let mut archive = build_archive(&seeded()).unwrap();
        let mut manifest: Manifest =
            serde_json::from_slice(archive.get(MANIFEST_ENTRY).unwrap()).unwrap();
        manifest.app_version = "2.3.0".into();
        archive.insert(MANIFEST_ENTRY, serde_json::to_vec(&manifest).unwrap());

        let mut target = SqliteStore::open_in_memory().unwrap();
        restore_archive(&mut target, &archive, ImportOptions::default()).unwrap();

        let strict = ImportOptions {
            enforce_manifest_version: true,
        };
        let err = restore_archive(&mut target, &archive, strict).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidArchive(_)));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.zip");
        let source = seeded();
        export_to_path(&source, &path).await.unwrap();

        let mut target = SqliteStore::open_in_memory().unwrap();
        let report = import_from_path(&mut target, &path, ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(report.photos_restored, 3);
        assert_eq!(target.list_photos().unwrap(), source.list_photos().unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_restore_on_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser-backup.zip");
        tokio::fs::write(&path, browser_backup()).await.unwrap();

        let mut target = seeded();
        let report = import_from_path(&mut target, &path, ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(report.photos_restored, 2);
        assert_eq!(target.count_containers().unwrap(), 1);

        export_to_path(&target, &path).await.unwrap();
        let bytes = tokio::fs::read(&path).await.unwrap();
        assert!(bytes.starts_with(b"PK\x03\x04"));
    }
}
