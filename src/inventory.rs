/// The inventory facade used by the UI layer.
///
/// Owns one record store and runs every user-facing flow against it:
/// id entry, container and photo edits, search, stats and backups.
/// Every flow that changes a container or one of its photos bumps the
/// container's `updated_at` here, so the store itself stays a plain
/// key-value contract.

use std::path::Path;

use crate::backup::{self, ImportOptions, ImportReport, StorageStats};
use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};
use crate::ident;
use crate::media::{ImageProcessor, ProcessedImage};
use crate::search;
use crate::state::data::{generate_photo_id, now_millis, DEFAULT_LABEL};
use crate::state::{Container, Photo, RecordStore, SqliteStore};

/// Form input for adding or editing a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDraft {
    /// Raw id as typed or scanned; `None` generates one
    pub id: Option<String>,
    pub label: String,
    pub location: String,
    pub notes: String,
}

/// A processed image waiting to be attached to a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub image: ProcessedImage,
    pub description: Option<String>,
}

/// Trimmed text, `None` when nothing is left
fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub struct Inventory<S: RecordStore> {
    store: S,
    import_options: ImportOptions,
}

impl Inventory<SqliteStore> {
    /// Open the local SQLite inventory described by `config`
    pub fn open(config: &InventoryConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path)?;
        if let Some(path) = store.path() {
            tracing::info!(
                "inventory ready at {} with {} containers",
                path.display(),
                store.count_containers()?
            );
        }
        Ok(Self::new(store).with_import_options(config.import_options()))
    }
}

impl<S: RecordStore> Inventory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            import_options: ImportOptions::default(),
        }
    }

    pub fn with_import_options(mut self, options: ImportOptions) -> Self {
        self.import_options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Canonical id for a typed or scanned value
    pub fn resolve_id(&self, raw: &str) -> Result<String> {
        Ok(ident::parse(raw)?)
    }

    /// A random id not used by any container yet
    pub fn generate_unused_id(&self) -> Result<String> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let candidate = ident::generate();
            if self.store.get_container(&candidate)?.is_none() {
                if attempts > 1 {
                    tracing::debug!("found free id {} after {} attempts", candidate, attempts);
                }
                return Ok(candidate);
            }
        }
    }

    /// Required lookup
    pub fn container(&self, id: &str) -> Result<Container> {
        self.store
            .get_container(id)?
            .ok_or_else(|| InventoryError::NotFound(id.to_string()))
    }

    /// The home list, most recently touched first
    pub fn containers(&self) -> Result<Vec<Container>> {
        self.store.list_containers()
    }

    pub fn add_container(&mut self, draft: ContainerDraft) -> Result<Container> {
        let now = now_millis();
        let mut container = Container {
            id: String::new(),
            label: non_empty(&draft.label).unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            location: draft.location.trim().to_string(),
            notes: non_empty(&draft.notes),
            created_at: now,
            updated_at: now,
        };

        match draft.id {
            Some(raw) => {
                container.id = self.resolve_id(&raw)?;
                self.store.create_container(&container)?;
            }
            None => loop {
                container.id = self.generate_unused_id()?;
                match self.store.create_container(&container) {
                    Err(InventoryError::DuplicateId(_)) => continue,
                    other => break other?,
                }
            },
        }

        tracing::info!("created container {}", container.id);
        Ok(container)
    }

    /// Replace label, location and notes; the id in `draft` is ignored
    pub fn edit_container(&mut self, id: &str, draft: ContainerDraft) -> Result<Container> {
        let mut container = self.container(id)?;
        container.label = non_empty(&draft.label).unwrap_or_else(|| DEFAULT_LABEL.to_string());
        container.location = draft.location.trim().to_string();
        container.notes = non_empty(&draft.notes);
        container.touch();
        self.store.update_container(&container)?;
        Ok(container)
    }

    /// Delete a container with all of its photos. No-op if absent.
    pub fn delete_container(&mut self, id: &str) -> Result<()> {
        self.store.delete_container(id)?;
        tracing::info!("deleted container {}", id);
        Ok(())
    }

    /// Photos of a container, newest first
    pub fn photos(&self, container_id: &str) -> Result<Vec<Photo>> {
        self.store.list_photos_by_container(container_id)
    }

    fn touch_container(&mut self, id: &str) -> Result<()> {
        let mut container = self.container(id)?;
        container.touch();
        self.store.update_container(&container)
    }

    pub fn add_photos(&mut self, container_id: &str, new_photos: Vec<NewPhoto>) -> Result<Vec<Photo>> {
        self.container(container_id)?;

        let mut created = Vec::with_capacity(new_photos.len());
        for new_photo in new_photos {
            let photo = Photo {
                id: generate_photo_id(),
                container_id: container_id.to_string(),
                description: new_photo.description.as_deref().and_then(non_empty),
                image_blob: new_photo.image.image_blob,
                thumbnail_blob: new_photo.image.thumbnail_blob,
                created_at: now_millis(),
            };
            self.store.create_photo(&photo)?;
            created.push(photo);
        }

        self.touch_container(container_id)?;
        Ok(created)
    }

    /// Process source images and attach them to a container
    pub fn add_source_images(
        &mut self,
        container_id: &str,
        processor: &dyn ImageProcessor,
        sources: &[(&[u8], Option<String>)],
    ) -> Result<Vec<Photo>> {
        let mut new_photos = Vec::with_capacity(sources.len());
        for (source, description) in sources {
            new_photos.push(NewPhoto {
                image: processor.process(source)?,
                description: description.clone(),
            });
        }
        self.add_photos(container_id, new_photos)
    }

    pub fn set_photo_description(&mut self, photo_id: &str, description: &str) -> Result<Photo> {
        let mut photo = self
            .store
            .get_photo(photo_id)?
            .ok_or_else(|| InventoryError::NotFound(photo_id.to_string()))?;
        photo.description = non_empty(description);
        self.store.update_photo(&photo)?;
        self.touch_container(&photo.container_id)?;
        Ok(photo)
    }

    /// Delete one photo. No-op if absent.
    pub fn delete_photo(&mut self, photo_id: &str) -> Result<()> {
        let Some(meta) = self.store.get_photo_meta(photo_id)? else {
            return Ok(());
        };
        self.store.delete_photo(photo_id)?;
        self.touch_container(&meta.container_id)
    }

    pub fn search(&self, query: &str) -> Result<Vec<Container>> {
        search::search(&self.store, query)
    }

    pub fn stats(&self) -> Result<StorageStats> {
        backup::stats(&self.store)
    }

    pub fn export(&self) -> Result<Vec<u8>> {
        backup::export_all(&self.store)
    }

    /// Replace the whole inventory with a backup
    pub fn import(&mut self, archive: &[u8]) -> Result<ImportReport> {
        backup::import_all(&mut self.store, archive, self.import_options)
            .inspect_err(log_failed_restore)
    }

    pub async fn export_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        backup::export_to_path(&self.store, path).await
    }

    pub async fn import_from_path(&mut self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let options = self.import_options;
        backup::import_from_path(&mut self.store, path, options)
            .await
            .inspect_err(log_failed_restore)
    }
}

/// A restore that fails while writing may leave a non-transactional store partly replaced
fn log_failed_restore(err: &InventoryError) {
    if err.is_storage_failure() {
        tracing::error!("restore failed while writing, inventory may be incomplete: {}", err);
    } else {
        tracing::warn!("restore rejected, inventory unchanged: {}", err);
    }
}
