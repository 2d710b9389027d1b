use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::data::{ImageDescriptor, ImagePair, ImagePayload, ImageRecord, RecordId};
use crate::error::CatalogError;

pub type CatalogResult<T> = Result<T, CatalogError>;

const RECORD_COLUMNS: &str = "id, name, description, source_url, \
     full_image, full_width, full_height, \
     thumbnail, thumb_width, thumb_height, inserted_at";

/// The Catalog manages the SQLite database of image records.
/// It stores manifest metadata along with the downloaded image and thumbnail.
///
/// Every mutation is a single statement on one connection in autocommit
/// mode, so it is durable by the time the call returns.
pub struct Catalog {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let db_path = path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!("Catalog opened at {}", db_path.display());

        let mut catalog = Catalog {
            conn,
            db_path: Some(db_path),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Open a catalog that lives only as long as this value
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut catalog = Catalog {
            conn,
            db_path: None,
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Where the database should be stored by default.
    ///
    /// - Linux: ~/.local/share/hinge-gallery/gallery.db
    /// - macOS: ~/Library/Application Support/hinge-gallery/gallery.db
    /// - Windows: %APPDATA%\hinge-gallery\gallery.db
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("hinge-gallery");
        path.push("gallery.db");
        Some(path)
    }

    /// Create the images table if it doesn't exist.
    fn init_schema(&mut self) -> CatalogResult<()> {
        // source_url is UNIQUE so each remote image has at most one record;
        // SQLite allows many NULLs, which covers manifest entries without a URL
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT,
                description     TEXT,
                source_url      TEXT UNIQUE,
                full_image      BLOB,
                full_width      INTEGER,
                full_height     INTEGER,
                thumbnail       BLOB,
                thumb_width     INTEGER,
                thumb_height    INTEGER,
                inserted_at     INTEGER NOT NULL
            )",
            [],
        )?;

        debug!("Catalog schema initialized");
        Ok(())
    }

    /// Path to the database file (None for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Count of records in the catalog
    pub fn image_count(&self) -> CatalogResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All records, in insertion order
    pub fn fetch_all(&self) -> CatalogResult<Vec<ImageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM images ORDER BY id ASC"))?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn get(&self, id: RecordId) -> CatalogResult<Option<ImageRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM images WHERE id = ?1"),
                [id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn find_by_url(&self, url: &str) -> CatalogResult<Option<ImageRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM images WHERE source_url = ?1"),
                [url],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert a new record with empty image fields.
    /// A descriptor whose URL is already catalogued returns the existing record.
    pub fn insert(&self, descriptor: &ImageDescriptor) -> CatalogResult<ImageRecord> {
        let inserted_at = Utc::now().timestamp();

        let result = self.conn.execute(
            "INSERT INTO images (name, description, source_url, inserted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                descriptor.name,
                descriptor.description,
                descriptor.source_url,
                inserted_at,
            ],
        );

        match result {
            Ok(_) => Ok(ImageRecord {
                id: self.conn.last_insert_rowid(),
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                source_url: descriptor.source_url.clone(),
                full_image: None,
                thumbnail: None,
                inserted_at,
            }),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                // UNIQUE(source_url) hit: hand back the record we already have
                let existing = match descriptor.source_url.as_deref() {
                    Some(url) => self.find_by_url(url)?,
                    None => None,
                };
                match existing {
                    Some(record) => {
                        debug!("Skipping duplicate image URL for record {}", record.id);
                        Ok(record)
                    }
                    None => Err(rusqlite::Error::SqliteFailure(err, msg).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store the downloaded image and thumbnail for a record.
    /// Image fields are write-once: a loaded record is never overwritten.
    pub fn update(&self, id: RecordId, pair: &ImagePair) -> CatalogResult<()> {
        let changed = self.conn.execute(
            "UPDATE images
             SET full_image = ?1, full_width = ?2, full_height = ?3,
                 thumbnail = ?4, thumb_width = ?5, thumb_height = ?6
             WHERE id = ?7 AND full_image IS NULL AND thumbnail IS NULL",
            params![
                pair.full.bytes(),
                pair.full.width(),
                pair.full.height(),
                pair.thumbnail.bytes(),
                pair.thumbnail.width(),
                pair.thumbnail.height(),
                id,
            ],
        )?;

        if changed == 1 {
            return Ok(());
        }

        // Nothing changed: either the record is gone or already loaded
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM images WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if exists {
            Err(CatalogError::AlreadyLoaded(id))
        } else {
            Err(CatalogError::NotFound(id))
        }
    }

    /// Delete one record. Returns false if it did not exist.
    pub fn delete_one(&self, id: RecordId) -> CatalogResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM images WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Delete every record in a single statement.
    /// Returns how many records were removed.
    pub fn delete_all(&self) -> CatalogResult<usize> {
        let deleted = self.conn.execute("DELETE FROM images", [])?;
        info!("Cleared {} records from catalog", deleted);
        Ok(deleted)
    }
}

/// Map a row selected with `RECORD_COLUMNS` into a record
fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        source_url: row.get(3)?,
        full_image: payload_from_columns(row.get(4)?, row.get(5)?, row.get(6)?),
        thumbnail: payload_from_columns(row.get(7)?, row.get(8)?, row.get(9)?),
        inserted_at: row.get(10)?,
    })
}

fn payload_from_columns(
    bytes: Option<Vec<u8>>,
    width: Option<u32>,
    height: Option<u32>,
) -> Option<ImagePayload> {
    Some(ImagePayload::new(bytes?, width.unwrap_or(0), height.unwrap_or(0)))
}

// Implement Debug for better error messages
impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(n: u32) -> ImageDescriptor {
        ImageDescriptor::new(
            format!("image-{n}"),
            format!("description {n}"),
            format!("http://example.com/{n}.jpg"),
        )
    }

    fn pair() -> ImagePair {
        ImagePair {
            full: ImagePayload::new(vec![1u8, 2, 3, 4], 600, 400),
            thumbnail: ImagePayload::new(vec![5u8, 6], 300, 200),
        }
    }

    #[test]
    fn test_insert_visible_with_null_images() {
        let catalog = Catalog::open_in_memory().unwrap();
        let record = catalog.insert(&descriptor(1)).unwrap();

        let all = catalog.fetch_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, record.id);
        assert_eq!(all[0].name.as_deref(), Some("image-1"));
        assert_eq!(all[0].description.as_deref(), Some("description 1"));
        assert!(all[0].full_image.is_none());
        assert!(all[0].thumbnail.is_none());
    }

    #[test]
    fn test_update_populates_images() {
        let catalog = Catalog::open_in_memory().unwrap();
        let record = catalog.insert(&descriptor(1)).unwrap();
        catalog.update(record.id, &pair()).unwrap();

        let all = catalog.fetch_all().unwrap();
        let stored = &all[0];
        assert!(stored.is_loaded());
        assert_eq!(stored.full_image.as_ref().unwrap().bytes(), &[1, 2, 3, 4]);
        assert_eq!(stored.thumbnail.as_ref().unwrap().width(), 300);
        assert_eq!(stored.thumbnail.as_ref().unwrap().height(), 200);
    }

    #[test]
    fn test_update_is_write_once() {
        let catalog = Catalog::open_in_memory().unwrap();
        let record = catalog.insert(&descriptor(1)).unwrap();
        catalog.update(record.id, &pair()).unwrap();

        let err = catalog.update(record.id, &pair()).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyLoaded(id) if id == record.id));
    }

    #[test]
    fn test_update_missing_record() {
        let catalog = Catalog::open_in_memory().unwrap();
        let err = catalog.update(42, &pair()).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(42)));
    }

    #[test]
    fn test_delete_all_empties_catalog() {
        let catalog = Catalog::open_in_memory().unwrap();
        for n in 0..5 {
            catalog.insert(&descriptor(n)).unwrap();
        }

        assert_eq!(catalog.delete_all().unwrap(), 5);
        assert!(catalog.fetch_all().unwrap().is_empty());
        assert_eq!(catalog.image_count().unwrap(), 0);
    }

    #[test]
    fn test_delete_one() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.insert(&descriptor(1)).unwrap();
        let second = catalog.insert(&descriptor(2)).unwrap();

        assert!(catalog.delete_one(first.id).unwrap());
        assert!(!catalog.delete_one(first.id).unwrap());

        let all = catalog.fetch_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, second.id);
    }

    #[test]
    fn test_fetch_all_keeps_insertion_order() {
        let catalog = Catalog::open_in_memory().unwrap();
        let ids: Vec<_> = (0..4)
            .map(|n| catalog.insert(&descriptor(n)).unwrap().id)
            .collect();

        let fetched: Vec<_> = catalog.fetch_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(fetched, ids);
    }

    #[test]
    fn test_duplicate_url_returns_existing() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.insert(&descriptor(1)).unwrap();
        let again = catalog.insert(&descriptor(1)).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(catalog.image_count().unwrap(), 1);
    }

    #[test]
    fn test_descriptors_without_url_are_distinct() {
        let catalog = Catalog::open_in_memory().unwrap();
        let blank = ImageDescriptor::default();
        let a = catalog.insert(&blank).unwrap();
        let b = catalog.insert(&blank).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(catalog.image_count().unwrap(), 2);
    }

    #[test]
    fn test_lookup_helpers() {
        let catalog = Catalog::open_in_memory().unwrap();
        let record = catalog.insert(&descriptor(3)).unwrap();

        let by_id = catalog.get(record.id).unwrap().unwrap();
        let by_url = catalog.find_by_url("http://example.com/3.jpg").unwrap().unwrap();
        assert_eq!(by_id, by_url);
        assert!(catalog.get(999).unwrap().is_none());
        assert!(catalog.find_by_url("http://example.com/none.jpg").unwrap().is_none());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("gallery.db");

        let id = {
            let catalog = Catalog::open(&path).unwrap();
            assert_eq!(catalog.path(), Some(path.as_path()));
            let record = catalog.insert(&descriptor(1)).unwrap();
            catalog.update(record.id, &pair()).unwrap();
            record.id
        };

        let reopened = Catalog::open(&path).unwrap();
        let stored = reopened.get(id).unwrap().unwrap();
        assert!(stored.is_loaded());
        assert_eq!(stored.full_image.unwrap().width(), 600);
    }
}
