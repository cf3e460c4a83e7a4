/// Remote record store
///
/// Implements [`RecordStore`] on top of a hosted table + object storage
/// backend reached through [`RemoteApi`]. The network client itself lives
/// outside this crate; this module only maps records to rows and objects,
/// and maps transport failures to `Unavailable` / `Unauthenticated` so a
/// broken connection never looks like an empty inventory. A request the
/// server refuses surfaces as `Rejected`, not as an outage.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::data::{Container, Photo, PhotoMeta};
use super::store::RecordStore;
use crate::error::{InventoryError, Result};

const CONTAINERS: &str = "containers";
const PHOTOS: &str = "photos";

/// Failure reported by the remote transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("session missing or expired")]
    Unauthorized,
    /// Unique constraint violated on the server
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<RemoteError> for InventoryError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Network(msg) => InventoryError::Unavailable(msg),
            RemoteError::Unauthorized => InventoryError::Unauthenticated,
            RemoteError::Conflict(id) => InventoryError::DuplicateId(id),
            RemoteError::Rejected(msg) => InventoryError::Rejected(msg),
        }
    }
}

/// Table and object-storage operations offered by the hosted backend
pub trait RemoteApi {
    /// Id of the signed-in user, `None` if there is no session
    fn user_id(&self) -> std::result::Result<Option<String>, RemoteError>;

    /// Rows of `table`, optionally restricted to `column = value`
    fn select(
        &self,
        table: &str,
        filter: Option<(&str, &str)>,
    ) -> std::result::Result<Vec<Value>, RemoteError>;

    fn insert(&self, table: &str, row: Value) -> std::result::Result<(), RemoteError>;

    /// Overwrite the given fields of the row with primary key `id`
    fn update(&self, table: &str, id: &str, fields: Value) -> std::result::Result<(), RemoteError>;

    /// Delete every row with `column = value`
    fn delete(&self, table: &str, column: &str, value: &str)
        -> std::result::Result<(), RemoteError>;

    /// Store an object under `path` (overwriting) and return its public URL
    fn upload(&self, path: &str, bytes: &[u8]) -> std::result::Result<String, RemoteError>;

    /// Fetch an object by URL, `None` if it cannot be retrieved
    fn download(&self, url: &str) -> std::result::Result<Option<Vec<u8>>, RemoteError>;

    fn remove_object(&self, path: &str) -> std::result::Result<(), RemoteError>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ContainerRow {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    label: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct PhotoRow {
    id: String,
    container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    image_url: String,
    thumbnail_url: String,
    created_at: String,
}

fn to_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn from_rfc3339(value: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| InventoryError::MalformedData(format!("bad timestamp {:?}: {}", value, e)))
}

fn parse_rows<T: for<'de> Deserialize<'de>>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(InventoryError::from))
        .collect()
}

impl ContainerRow {
    fn into_container(self) -> Result<Container> {
        Ok(Container {
            id: self.id,
            label: self.label,
            location: self.location,
            notes: self.notes,
            created_at: from_rfc3339(&self.created_at)?,
            updated_at: from_rfc3339(&self.updated_at)?,
        })
    }
}

impl PhotoRow {
    fn meta(&self) -> Result<PhotoMeta> {
        Ok(PhotoMeta {
            id: self.id.clone(),
            container_id: self.container_id.clone(),
            description: self.description.clone(),
            created_at: from_rfc3339(&self.created_at)?,
        })
    }
}

/// Storage path of an object given its public URL
fn object_path(url: &str) -> Option<&str> {
    url.split_once("/photos/").map(|(_, path)| path)
}

/// Record store backed by a hosted database
pub struct RemoteStore<A: RemoteApi> {
    api: A,
}

impl<A: RemoteApi> RemoteStore<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    fn require_user(&self) -> Result<String> {
        self.api.user_id()?.ok_or(InventoryError::Unauthenticated)
    }

    fn container_rows(&self, filter: Option<(&str, &str)>) -> Result<Vec<ContainerRow>> {
        parse_rows(self.api.select(CONTAINERS, filter)?)
    }

    fn photo_rows(&self, filter: Option<(&str, &str)>) -> Result<Vec<PhotoRow>> {
        parse_rows(self.api.select(PHOTOS, filter)?)
    }

    /// Download both blobs; `None` if either one is missing
    fn load_photo(&self, row: &PhotoRow) -> Result<Option<Photo>> {
        let image = self.api.download(&row.image_url)?;
        let thumbnail = self.api.download(&row.thumbnail_url)?;
        match (image, thumbnail) {
            (Some(image), Some(thumbnail)) => Ok(Some(row.meta()?.with_blobs(image, thumbnail))),
            _ => {
                tracing::warn!("missing image data for photo {}, skipping", row.id);
                Ok(None)
            }
        }
    }

    fn load_photos(&self, rows: &[PhotoRow]) -> Result<Vec<Photo>> {
        let mut photos = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(photo) = self.load_photo(row)? {
                photos.push(photo);
            }
        }
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(photos)
    }

    fn insert_container_row(&self, user: &str, c: &Container) -> Result<()> {
        let row = ContainerRow {
            id: c.id.clone(),
            user_id: Some(user.to_string()),
            label: c.label.clone(),
            location: c.location.clone(),
            notes: c.notes.clone(),
            created_at: to_rfc3339(c.created_at),
            updated_at: to_rfc3339(c.updated_at),
        };
        self.api.insert(CONTAINERS, serde_json::to_value(row)?)?;
        Ok(())
    }

    fn insert_photo_row(&self, user: &str, p: &Photo) -> Result<()> {
        let image_url = self
            .api
            .upload(&format!("{}/{}-full", user, p.id), &p.image_blob)?;
        let thumbnail_url = self
            .api
            .upload(&format!("{}/{}-thumb", user, p.id), &p.thumbnail_blob)?;

        let row = PhotoRow {
            id: p.id.clone(),
            container_id: p.container_id.clone(),
            user_id: Some(user.to_string()),
            description: p.description.clone(),
            image_url,
            thumbnail_url,
            created_at: to_rfc3339(p.created_at),
        };
        self.api.insert(PHOTOS, serde_json::to_value(row)?)?;
        Ok(())
    }
}

impl<A: RemoteApi> RecordStore for RemoteStore<A> {
    fn get_container(&self, id: &str) -> Result<Option<Container>> {
        self.container_rows(Some(("id", id)))?
            .into_iter()
            .next()
            .map(ContainerRow::into_container)
            .transpose()
    }

    fn list_containers(&self) -> Result<Vec<Container>> {
        let mut containers = self
            .container_rows(None)?
            .into_iter()
            .map(ContainerRow::into_container)
            .collect::<Result<Vec<_>>>()?;
        containers.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(containers)
    }

    fn create_container(&mut self, container: &Container) -> Result<()> {
        let user = self.require_user()?;
        container.check()?;
        if self.get_container(&container.id)?.is_some() {
            return Err(InventoryError::DuplicateId(container.id.clone()));
        }
        self.insert_container_row(&user, container)
    }

    fn update_container(&mut self, c: &Container) -> Result<()> {
        c.check()?;
        if self.get_container(&c.id)?.is_none() {
            let user = self.require_user()?;
            return self.insert_container_row(&user, c);
        }
        let fields = serde_json::json!({
            "label": c.label,
            "location": c.location,
            "notes": c.notes,
            "created_at": to_rfc3339(c.created_at),
            "updated_at": to_rfc3339(c.updated_at),
        });
        self.api.update(CONTAINERS, &c.id, fields)?;
        Ok(())
    }

    fn delete_container(&mut self, id: &str) -> Result<()> {
        for row in self.photo_rows(Some(("container_id", id)))? {
            self.delete_photo(&row.id)?;
        }
        self.api.delete(CONTAINERS, "id", id)?;
        Ok(())
    }

    fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        match self.photo_rows(Some(("id", id)))?.first() {
            Some(row) => self.load_photo(row),
            None => Ok(None),
        }
    }

    fn list_photos_by_container(&self, container_id: &str) -> Result<Vec<Photo>> {
        let rows = self.photo_rows(Some(("container_id", container_id)))?;
        self.load_photos(&rows)
    }

    fn list_photos(&self) -> Result<Vec<Photo>> {
        let rows = self.photo_rows(None)?;
        self.load_photos(&rows)
    }

    fn get_photo_meta(&self, id: &str) -> Result<Option<PhotoMeta>> {
        self.photo_rows(Some(("id", id)))?
            .first()
            .map(PhotoRow::meta)
            .transpose()
    }

    fn list_photo_meta(&self) -> Result<Vec<PhotoMeta>> {
        self.photo_rows(None)?.iter().map(PhotoRow::meta).collect()
    }

    fn create_photo(&mut self, photo: &Photo) -> Result<()> {
        let user = self.require_user()?;
        if self.get_container(&photo.container_id)?.is_none() {
            return Err(InventoryError::NotFound(photo.container_id.clone()));
        }
        if !self.photo_rows(Some(("id", photo.id.as_str())))?.is_empty() {
            return Err(InventoryError::DuplicateId(photo.id.clone()));
        }
        self.insert_photo_row(&user, photo)
    }

    fn update_photo(&mut self, photo: &Photo) -> Result<()> {
        if self.photo_rows(Some(("id", photo.id.as_str())))?.is_empty() {
            return self.create_photo(photo);
        }
        // Blobs are immutable once uploaded; only the description changes.
        self.api.update(
            PHOTOS,
            &photo.id,
            serde_json::json!({ "description": photo.description }),
        )?;
        Ok(())
    }

    fn delete_photo(&mut self, id: &str) -> Result<()> {
        if let Some(row) = self.photo_rows(Some(("id", id)))?.first() {
            for url in [&row.image_url, &row.thumbnail_url] {
                if let Some(path) = object_path(url) {
                    self.api.remove_object(path)?;
                }
            }
        }
        self.api.delete(PHOTOS, "id", id)?;
        Ok(())
    }

    fn count_photos_by_container(&self, container_id: &str) -> Result<usize> {
        Ok(self.photo_rows(Some(("container_id", container_id)))?.len())
    }

    fn clear_all(&mut self) -> Result<()> {
        for row in self.photo_rows(None)? {
            self.delete_photo(&row.id)?;
        }
        for row in self.container_rows(None)? {
            self.api.delete(CONTAINERS, "id", &row.id)?;
        }
        Ok(())
    }

    fn bulk_insert_containers(&mut self, containers: &[Container]) -> Result<()> {
        let user = self.require_user()?;
        for c in containers {
            c.check()?;
            if self.get_container(&c.id)?.is_some() {
                return Err(InventoryError::DuplicateId(c.id.clone()));
            }
            self.insert_container_row(&user, c)?;
        }
        Ok(())
    }

    fn bulk_insert_photos(&mut self, photos: &[Photo]) -> Result<()> {
        for p in photos {
            self.create_photo(p)?;
        }
        Ok(())
    }
}
