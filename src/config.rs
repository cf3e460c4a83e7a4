/// Inventory configuration
///
/// Every field has a default, so an empty TOML document (or no file at
/// all) yields a working setup:
///
/// ```toml
/// db_path = "/home/me/.local/share/boxkeep/boxkeep.db"
/// max_image_dimension = 1920
/// thumbnail_size = 256
/// jpeg_quality = 85
/// enforce_manifest_version = false
/// ```

use serde::Deserialize;
use std::path::PathBuf;

use crate::backup::ImportOptions;
use crate::error::{InventoryError, Result};

/// Directory name under the user's data directory
const APP_DIR: &str = "boxkeep";
const DB_FILE: &str = "boxkeep.db";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InventoryConfig {
    /// SQLite catalog location
    pub db_path: PathBuf,
    /// Longest side of stored full-size photos, in pixels
    pub max_image_dimension: u32,
    /// Bounding square of stored thumbnails, in pixels
    pub thumbnail_size: u32,
    /// JPEG quality (1-100) for both stored images
    pub jpeg_quality: u8,
    /// Refuse backups written by a different major archive version
    pub enforce_manifest_version: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
            max_image_dimension: 1920,
            thumbnail_size: 256,
            jpeg_quality: 85,
            enforce_manifest_version: false,
        }
    }
}

impl InventoryConfig {
    /// Where the database lives by default:
    /// - Linux: ~/.local/share/boxkeep/boxkeep.db
    /// - macOS: ~/Library/Application Support/boxkeep/boxkeep.db
    /// - Windows: %APPDATA%\boxkeep\boxkeep.db
    ///
    /// Falls back to the home directory, then the working directory.
    pub fn default_db_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_default();

        path.push(APP_DIR);
        path.push(DB_FILE);
        path
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| InventoryError::MalformedData(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_image_dimension == 0 || self.thumbnail_size == 0 {
            return Err(InventoryError::MalformedData(
                "image dimensions must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(InventoryError::MalformedData(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            enforce_manifest_version: self.enforce_manifest_version,
        }
    }
}
