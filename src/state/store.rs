/// The record store contract shared by every storage backend.
///
/// Search, backup and storage statistics depend only on this trait, never
/// on a concrete backend. Writes take `&mut self`, so a caller holding the
/// store exclusively (an import, for instance) cannot be interleaved with
/// any other access to the same store.

use super::data::{Container, Photo, PhotoMeta};
use crate::error::Result;

pub trait RecordStore {
    fn get_container(&self, id: &str) -> Result<Option<Container>>;

    /// All containers, most recently updated first
    fn list_containers(&self) -> Result<Vec<Container>>;

    /// Insert a new container. Fails with `DuplicateId` if the id is taken,
    /// and rejects containers that fail [`Container::check`].
    fn create_container(&mut self, container: &Container) -> Result<()>;

    /// Upsert by id, replacing every field. Does not touch `updated_at`.
    /// Rejects containers that fail [`Container::check`].
    fn update_container(&mut self, container: &Container) -> Result<()>;

    /// Delete a container and every photo it owns. No-op if absent.
    fn delete_container(&mut self, id: &str) -> Result<()>;

    fn get_photo(&self, id: &str) -> Result<Option<Photo>>;

    /// Photos of one container, newest first
    fn list_photos_by_container(&self, container_id: &str) -> Result<Vec<Photo>>;

    /// Every photo with its blobs
    fn list_photos(&self) -> Result<Vec<Photo>>;

    /// One photo's row without its blobs. Unlike `get_photo`, this finds the
    /// photo even when a backend can no longer produce its blobs.
    fn get_photo_meta(&self, id: &str) -> Result<Option<PhotoMeta>> {
        Ok(self
            .list_photo_meta()?
            .into_iter()
            .find(|meta| meta.id == id))
    }

    /// Every photo without its blobs
    fn list_photo_meta(&self) -> Result<Vec<PhotoMeta>> {
        Ok(self.list_photos()?.iter().map(Photo::meta).collect())
    }

    /// Insert a new photo. The owning container must exist.
    fn create_photo(&mut self, photo: &Photo) -> Result<()>;

    /// Upsert by id
    fn update_photo(&mut self, photo: &Photo) -> Result<()>;

    /// No-op if absent
    fn delete_photo(&mut self, id: &str) -> Result<()>;

    fn count_photos_by_container(&self, container_id: &str) -> Result<usize>;

    fn count_containers(&self) -> Result<usize> {
        Ok(self.list_containers()?.len())
    }

    fn count_photos(&self) -> Result<usize> {
        Ok(self.list_photo_meta()?.len())
    }

    /// Sum of image and thumbnail sizes over every photo
    fn total_blob_bytes(&self) -> Result<u64> {
        Ok(self.list_photos()?.iter().map(Photo::blob_bytes).sum())
    }

    /// Empty both collections
    fn clear_all(&mut self) -> Result<()>;

    /// Insert-only. Fails with `DuplicateId` if any id is already present,
    /// and rejects containers that fail [`Container::check`].
    fn bulk_insert_containers(&mut self, containers: &[Container]) -> Result<()>;

    /// Insert-only. Fails with `DuplicateId` if any id is already present.
    fn bulk_insert_photos(&mut self, photos: &[Photo]) -> Result<()>;

    /// Replace the whole store contents.
    ///
    /// Backends with transactions override this so the clear and both
    /// inserts commit together.
    fn replace_all(&mut self, containers: &[Container], photos: &[Photo]) -> Result<()> {
        self.clear_all()?;
        self.bulk_insert_containers(containers)?;
        self.bulk_insert_photos(photos)
    }
}
