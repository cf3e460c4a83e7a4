/// Tagged archive: an ordered set of named byte streams
///
/// The backup codec only talks to [`TaggedArchive`]; the on-disk container
/// format is confined to [`TaggedArchive::to_bytes`] and
/// [`TaggedArchive::from_bytes`]. Archives are written as ZIP, the format
/// every other install of the app produces. Tar streams written by earlier
/// versions of this crate are still read.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use tar::{Archive, EntryType};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{InventoryError, Result};

/// Extension used when an image blob's format cannot be detected
pub const FALLBACK_EXTENSION: &str = "jpg";

/// Local file header signature that opens every non-empty ZIP stream
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// End-of-central-directory signature; an empty ZIP is only this record
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedArchive {
    entries: Vec<ArchiveEntry>,
}

impl TaggedArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any existing entry with the same name in place
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.bytes = bytes,
            None => self.entries.push(ArchiveEntry { name, bytes }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let index = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(index).bytes)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bytes.as_slice())
    }

    /// Entries directly under `folder/`, keyed by file stem (`photos/p1.jpg` -> `p1`).
    /// Names in nested folders (`photos/a/b.jpg`) are not included.
    pub fn folder_index(&self, folder: &str) -> HashMap<&str, &[u8]> {
        let prefix = format!("{}/", folder);
        self.entries
            .iter()
            .filter_map(|e| {
                let file = e.name.strip_prefix(&prefix)?;
                if file.is_empty() || file.contains('/') {
                    return None;
                }
                let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
                Some((stem, e.bytes.as_slice()))
            })
            .collect()
    }

    /// Serialize as a ZIP stream, entries in insertion order
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(std::io::Error::other)?;
            writer.write_all(&entry.bytes)?;
        }
        let cursor = writer.finish().map_err(std::io::Error::other)?;
        Ok(cursor.into_inner())
    }

    /// Parse a ZIP or tar stream. Directory entries are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC) {
            Self::from_zip(bytes)
        } else {
            Self::from_tar(bytes)
        }
    }

    fn from_zip(bytes: &[u8]) -> Result<Self> {
        let unreadable = |e: zip::result::ZipError| InventoryError::InvalidArchive(format!("unreadable archive: {}", e));

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(unreadable)?;
        let mut tagged = TaggedArchive::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(unreadable)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().replace('\\', "/");
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| InventoryError::InvalidArchive(format!("unreadable archive entry {}: {}", name, e)))?;
            tagged.insert(name, data);
        }
        Ok(tagged)
    }

    fn from_tar(bytes: &[u8]) -> Result<Self> {
        let unreadable = |e: std::io::Error| InventoryError::InvalidArchive(format!("unreadable archive: {}", e));

        let mut archive = Archive::new(bytes);
        let mut tagged = TaggedArchive::new();
        for entry in archive.entries().map_err(unreadable)? {
            let mut entry = entry.map_err(unreadable)?;
            if entry.header().entry_type() == EntryType::Directory {
                continue;
            }
            let name = entry
                .path()
                .map_err(unreadable)?
                .to_string_lossy()
                .replace('\\', "/");
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(unreadable)?;
            tagged.insert(name, data);
        }
        Ok(tagged)
    }
}

/// File extension for an image blob, from its detected format
pub fn image_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or(FALLBACK_EXTENSION)
}
