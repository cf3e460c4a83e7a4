/// Shared data structures for the inventory state
///
/// These structs represent the data model that flows between
/// the record stores, the search engine and the backup archive.

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::ident;

/// Label shown for containers the user did not name
pub const DEFAULT_LABEL: &str = "Unlabeled";

/// Current time in milliseconds since the epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A physical storage box tracked by the inventory
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Canonical id (e.g. "C-AB12"), immutable once created
    pub id: String,
    pub label: String,
    /// Free-text location, may be empty
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: i64,
    /// Bumped on every edit of the container or one of its photos
    pub updated_at: i64,
}

impl Container {
    /// Set `updated_at` to now, never moving it behind `created_at` or its current value
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at).max(self.updated_at);
    }

    /// Reject records with a non-canonical id or with `updated_at` before `created_at`
    pub fn check(&self) -> Result<()> {
        ident::validate(&self.id)?;
        if self.updated_at < self.created_at {
            return Err(InventoryError::InvalidRecord(format!(
                "container {} updated at {} before its creation at {}",
                self.id, self.updated_at, self.created_at
            )));
        }
        Ok(())
    }
}

/// A photo attached to a container, with its thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    /// Owning container
    pub container_id: String,
    pub description: Option<String>,
    /// Full-resolution image bytes
    pub image_blob: Vec<u8>,
    /// Reduced-resolution image bytes
    pub thumbnail_blob: Vec<u8>,
    pub created_at: i64,
}

impl Photo {
    /// Every field except the two blobs
    pub fn meta(&self) -> PhotoMeta {
        PhotoMeta {
            id: self.id.clone(),
            container_id: self.container_id.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }

    /// Combined size of both blobs in bytes
    pub fn blob_bytes(&self) -> u64 {
        (self.image_blob.len() + self.thumbnail_blob.len()) as u64
    }
}

/// Photo fields without the binary data, as stored in `database.json`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMeta {
    pub id: String,
    pub container_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: i64,
}

impl PhotoMeta {
    /// Reunite metadata with its blobs
    pub fn with_blobs(self, image_blob: Vec<u8>, thumbnail_blob: Vec<u8>) -> Photo {
        Photo {
            id: self.id,
            container_id: self.container_id,
            description: self.description,
            image_blob,
            thumbnail_blob,
            created_at: self.created_at,
        }
    }
}

/// Generate a photo id: creation time plus a random base-36 suffix,
/// so photos created within the same millisecond do not collide
pub fn generate_photo_id() -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("photo-{}-{}", now_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_json_uses_camel_case() {
        let container = Container {
            id: "C-AB12".into(),
            label: "Tools".into(),
            location: "Garage".into(),
            notes: None,
            created_at: 1,
            updated_at: 2,
        };
        let json = serde_json::to_value(&container).unwrap();
        assert_eq!(json["createdAt"], 1);
        assert_eq!(json["updatedAt"], 2);
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_photo_meta_without_description_parses() {
        let meta: PhotoMeta =
            serde_json::from_str(r#"{"id":"p1","containerId":"C-AB12","createdAt":5}"#).unwrap();
        assert_eq!(meta.description, None);
        assert_eq!(meta.container_id, "C-AB12");
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut container = Container {
            id: "C-AB12".into(),
            label: "Tools".into(),
            location: String::new(),
            notes: None,
            created_at: i64::MAX - 1,
            updated_at: i64::MAX - 1,
        };
        container.touch();
        assert!(container.updated_at >= container.created_at);
    }

    #[test]
    fn test_check_rejects_broken_records() {
        let mut container = Container {
            id: "C-AB12".into(),
            label: "Tools".into(),
            location: String::new(),
            notes: None,
            created_at: 10,
            updated_at: 10,
        };
        container.check().unwrap();

        container.updated_at = 1;
        assert!(matches!(container.check(), Err(InventoryError::InvalidRecord(_))));

        container.updated_at = 10;
        container.id = "zzz".into();
        assert!(matches!(container.check(), Err(InventoryError::Validation(_))));
    }

    #[test]
    fn test_photo_ids_differ_under_rapid_creation() {
        let ids: std::collections::HashSet<String> = (0..200).map(|_| generate_photo_id()).collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.iter().all(|id| id.starts_with("photo-")));
    }
}
