use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::data::{Container, Photo, PhotoMeta};
use super::store::RecordStore;
use crate::error::{InventoryError, Result};

const CONTAINER_COLUMNS: &str = "id, label, location, notes, created_at, updated_at";
const PHOTO_COLUMNS: &str =
    "id, container_id, description, image_blob, thumbnail_blob, created_at";
const PHOTO_META_COLUMNS: &str = "id, container_id, description, created_at";

/// The SqliteStore keeps the container catalog in an embedded SQLite database.
/// It stores containers and their photos, blobs included, in a single file.
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the catalog database at `db_path` and initialize the schema.
    ///
    /// The parent directory is created if needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        tracing::info!("database opened at {}", db_path.display());

        let mut store = SqliteStore {
            conn,
            db_path: Some(db_path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = SqliteStore {
            conn,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS containers (
                id              TEXT PRIMARY KEY NOT NULL,
                label           TEXT NOT NULL,
                location        TEXT NOT NULL DEFAULT '',
                notes           TEXT,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        // No ON DELETE CASCADE: delete_container removes children explicitly
        // inside its own transaction.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS photos (
                id              TEXT PRIMARY KEY NOT NULL,
                container_id    TEXT NOT NULL,
                description     TEXT,
                image_blob      BLOB NOT NULL,
                thumbnail_blob  BLOB NOT NULL,
                created_at      INTEGER NOT NULL,
                FOREIGN KEY(container_id) REFERENCES containers(id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_containers_updated_at
             ON containers(updated_at DESC)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_photos_container_id
             ON photos(container_id, created_at DESC)",
            [],
        )?;

        tracing::debug!("database schema initialized");
        Ok(())
    }

    /// Path to the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

fn container_from_row(row: &Row<'_>) -> rusqlite::Result<Container> {
    Ok(Container {
        id: row.get(0)?,
        label: row.get(1)?,
        location: row.get(2)?,
        notes: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        container_id: row.get(1)?,
        description: row.get(2)?,
        image_blob: row.get(3)?,
        thumbnail_blob: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoMeta> {
    Ok(PhotoMeta {
        id: row.get(0)?,
        container_id: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", table),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_containers(conn: &Connection, containers: &[Container]) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO containers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        CONTAINER_COLUMNS
    ))?;
    for c in containers {
        c.check()?;
        if exists(conn, "containers", &c.id)? {
            return Err(InventoryError::DuplicateId(c.id.clone()));
        }
        stmt.execute(params![
            c.id,
            c.label,
            c.location,
            c.notes,
            c.created_at,
            c.updated_at
        ])?;
    }
    Ok(())
}

fn insert_photos(conn: &Connection, photos: &[Photo]) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO photos ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        PHOTO_COLUMNS
    ))?;
    for p in photos {
        if exists(conn, "photos", &p.id)? {
            return Err(InventoryError::DuplicateId(p.id.clone()));
        }
        if !exists(conn, "containers", &p.container_id)? {
            return Err(InventoryError::NotFound(p.container_id.clone()));
        }
        stmt.execute(params![
            p.id,
            p.container_id,
            p.description,
            p.image_blob,
            p.thumbnail_blob,
            p.created_at
        ])?;
    }
    Ok(())
}

impl RecordStore for SqliteStore {
    fn get_container(&self, id: &str) -> Result<Option<Container>> {
        let container = self
            .conn
            .query_row(
                &format!("SELECT {} FROM containers WHERE id = ?1", CONTAINER_COLUMNS),
                [id],
                container_from_row,
            )
            .optional()?;
        Ok(container)
    }

    fn list_containers(&self) -> Result<Vec<Container>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM containers ORDER BY updated_at DESC, id ASC",
            CONTAINER_COLUMNS
        ))?;

        let container_iter = stmt.query_map([], container_from_row)?;

        let mut containers = Vec::new();
        for container in container_iter {
            containers.push(container?);
        }
        Ok(containers)
    }

    fn create_container(&mut self, container: &Container) -> Result<()> {
        insert_containers(&self.conn, std::slice::from_ref(container))
    }

    fn update_container(&mut self, c: &Container) -> Result<()> {
        c.check()?;
        self.conn.execute(
            &format!(
                "INSERT INTO containers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    label = excluded.label,
                    location = excluded.location,
                    notes = excluded.notes,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at",
                CONTAINER_COLUMNS
            ),
            params![
                c.id,
                c.label,
                c.location,
                c.notes,
                c.created_at,
                c.updated_at
            ],
        )?;
        Ok(())
    }

    fn delete_container(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let photo_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM photos WHERE container_id = ?1")?;
            let ids = stmt
                .query_map([id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            ids
        };

        for photo_id in &photo_ids {
            tx.execute("DELETE FROM photos WHERE id = ?1", [photo_id])?;
        }
        let removed = tx.execute("DELETE FROM containers WHERE id = ?1", [id])?;
        tx.commit()?;

        if removed > 0 {
            tracing::debug!("deleted container {} and {} photos", id, photo_ids.len());
        }
        Ok(())
    }

    fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        let photo = self
            .conn
            .query_row(
                &format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS),
                [id],
                photo_from_row,
            )
            .optional()?;
        Ok(photo)
    }

    fn list_photos_by_container(&self, container_id: &str) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM photos WHERE container_id = ?1
             ORDER BY created_at DESC, id ASC",
            PHOTO_COLUMNS
        ))?;
        let photos = stmt
            .query_map([container_id], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn list_photos(&self) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM photos ORDER BY created_at DESC, id ASC",
            PHOTO_COLUMNS
        ))?;
        let photos = stmt
            .query_map([], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn get_photo_meta(&self, id: &str) -> Result<Option<PhotoMeta>> {
        let meta = self
            .conn
            .query_row(
                &format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_META_COLUMNS),
                [id],
                meta_from_row,
            )
            .optional()?;
        Ok(meta)
    }

    fn list_photo_meta(&self) -> Result<Vec<PhotoMeta>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM photos ORDER BY created_at DESC, id ASC",
            PHOTO_META_COLUMNS
        ))?;
        let metas = stmt
            .query_map([], meta_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(metas)
    }

    fn create_photo(&mut self, photo: &Photo) -> Result<()> {
        insert_photos(&self.conn, std::slice::from_ref(photo))
    }

    fn update_photo(&mut self, p: &Photo) -> Result<()> {
        if !exists(&self.conn, "containers", &p.container_id)? {
            return Err(InventoryError::NotFound(p.container_id.clone()));
        }
        self.conn.execute(
            &format!(
                "INSERT INTO photos ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    container_id = excluded.container_id,
                    description = excluded.description,
                    image_blob = excluded.image_blob,
                    thumbnail_blob = excluded.thumbnail_blob,
                    created_at = excluded.created_at",
                PHOTO_COLUMNS
            ),
            params![
                p.id,
                p.container_id,
                p.description,
                p.image_blob,
                p.thumbnail_blob,
                p.created_at
            ],
        )?;
        Ok(())
    }

    fn delete_photo(&mut self, id: &str) -> Result<()> {
        self.conn.execute("DELETE FROM photos WHERE id = ?1", [id])?;
        Ok(())
    }

    fn count_photos_by_container(&self, container_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE container_id = ?1",
            [container_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_containers(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM containers", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_photos(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn total_blob_bytes(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(image_blob) + LENGTH(thumbnail_blob)), 0) FROM photos",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM photos", [])?;
        tx.execute("DELETE FROM containers", [])?;
        tx.commit()?;
        Ok(())
    }

    fn bulk_insert_containers(&mut self, containers: &[Container]) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_containers(&tx, containers)?;
        tx.commit()?;
        Ok(())
    }

    fn bulk_insert_photos(&mut self, photos: &[Photo]) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_photos(&tx, photos)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_all(&mut self, containers: &[Container], photos: &[Photo]) -> Result<()> {
        // One transaction: readers see either the old contents or the new ones.
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM photos", [])?;
        tx.execute("DELETE FROM containers", [])?;
        insert_containers(&tx, containers)?;
        insert_photos(&tx, photos)?;
        tx.commit()?;

        tracing::info!(
            "store replaced: {} containers, {} photos",
            containers.len(),
            photos.len()
        );
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
