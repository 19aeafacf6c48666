//! SQLite-backed metadata store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite library is
//! required. All methods are synchronous rusqlite calls serialized by a
//! `Mutex` around the single connection; callers from async context hold the
//! lock only for the duration of one logical operation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use nebulafs_core::error::{Error, ErrorCode, Result};
use nebulafs_core::types::{Bucket, MultipartPart, MultipartUpload, ObjectRecord};
use nebulafs_core::{now_rfc3339, UploadState};

/// Metadata index over buckets, objects, multipart uploads, and parts.
///
/// Owns all durable naming and uniqueness invariants:
/// - bucket names are globally unique,
/// - `(bucket_id, name)` is unique on objects,
/// - `upload_id` is globally unique and `(upload_id, part_number)` is unique
///   on parts,
/// - deletes cascade buckets -> objects/uploads and uploads -> parts.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.apply_pragmas()?;
        store.init_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(db_err)
    }

    /// Create the required tables and indexes if they do not already exist.
    /// Idempotent, so safe to run on every startup.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS buckets (
                 id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 name       TEXT NOT NULL UNIQUE,
                 created_at TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS objects (
                 id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 bucket_id  INTEGER NOT NULL,
                 name       TEXT NOT NULL,
                 size_bytes INTEGER NOT NULL,
                 etag       TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 UNIQUE(bucket_id, name),
                 FOREIGN KEY(bucket_id) REFERENCES buckets(id) ON DELETE CASCADE
             );

             CREATE TABLE IF NOT EXISTS multipart_uploads (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 upload_id   TEXT NOT NULL UNIQUE,
                 bucket_id   INTEGER NOT NULL,
                 object_name TEXT NOT NULL,
                 state       TEXT NOT NULL,
                 expires_at  TEXT NOT NULL,
                 created_at  TEXT NOT NULL,
                 updated_at  TEXT NOT NULL,
                 FOREIGN KEY(bucket_id) REFERENCES buckets(id) ON DELETE CASCADE
             );

             CREATE INDEX IF NOT EXISTS idx_multipart_uploads_expires_at
                 ON multipart_uploads(expires_at);

             CREATE TABLE IF NOT EXISTS multipart_parts (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 upload_id   TEXT NOT NULL,
                 part_number INTEGER NOT NULL,
                 size_bytes  INTEGER NOT NULL,
                 etag        TEXT NOT NULL,
                 temp_path   TEXT NOT NULL,
                 created_at  TEXT NOT NULL,
                 UNIQUE(upload_id, part_number),
                 FOREIGN KEY(upload_id) REFERENCES multipart_uploads(upload_id)
                     ON DELETE CASCADE
             );

             CREATE INDEX IF NOT EXISTS idx_multipart_parts_upload_id
                 ON multipart_parts(upload_id);",
        )
        .map_err(db_err)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("metadata store mutex poisoned")
    }

    // === Bucket operations ===

    /// Insert a new bucket.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_EXISTS` when the name is taken.
    pub fn create_bucket(&self, name: &str) -> Result<Bucket> {
        {
            let conn = self.lock();
            let created_at = now_rfc3339();
            match conn.execute(
                "INSERT INTO buckets(name, created_at) VALUES(?1, ?2)",
                params![name, created_at],
            ) {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(Error::api(ErrorCode::AlreadyExists, "bucket already exists"));
                }
                Err(e) => return Err(db_err(e)),
            }
        }
        self.get_bucket(name)
    }

    /// List all buckets ordered by name ascending.
    ///
    /// # Errors
    ///
    /// Returns a database error when the query fails.
    pub fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM buckets ORDER BY name ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Bucket { id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Look up a bucket by name.
    ///
    /// # Errors
    ///
    /// Returns `BUCKET_NOT_FOUND` when absent.
    pub fn get_bucket(&self, name: &str) -> Result<Bucket> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, name, created_at FROM buckets WHERE name = ?1",
            params![name],
            |row| Ok(Bucket { id: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? }),
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::api(ErrorCode::BucketNotFound, "bucket not found"))
    }

    // === Object operations ===

    /// Insert or replace object metadata.
    ///
    /// On conflict `(bucket_id, name)` the size, etag, and `updated_at` are
    /// replaced while the original `created_at` is preserved.
    ///
    /// # Errors
    ///
    /// Returns `BUCKET_NOT_FOUND` when the bucket is absent.
    pub fn upsert_object(&self, bucket: &str, name: &str, size_bytes: u64, etag: &str) -> Result<ObjectRecord> {
        let bucket_row = self.get_bucket(bucket)?;
        {
            let conn = self.lock();
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO objects(bucket_id, name, size_bytes, etag, created_at, updated_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(bucket_id, name) DO UPDATE SET
                     size_bytes = excluded.size_bytes,
                     etag = excluded.etag,
                     updated_at = excluded.updated_at",
                params![bucket_row.id, name, size_bytes as i64, etag, now],
            )
            .map_err(db_err)?;
        }
        self.get_object(bucket, name)
    }

    /// Look up an object by bucket and name.
    ///
    /// # Errors
    ///
    /// Returns `OBJECT_NOT_FOUND` when absent.
    pub fn get_object(&self, bucket: &str, name: &str) -> Result<ObjectRecord> {
        let conn = self.lock();
        conn.query_row(
            "SELECT o.id, o.bucket_id, o.name, o.size_bytes, o.etag, o.created_at, o.updated_at
             FROM objects o JOIN buckets b ON o.bucket_id = b.id
             WHERE b.name = ?1 AND o.name = ?2",
            params![bucket, name],
            map_object_row,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::api(ErrorCode::ObjectNotFound, "object not found"))
    }

    /// List a bucket's objects whose names start with `prefix`, ordered by
    /// name ascending. An unknown bucket yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns a database error when the query fails.
    pub fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRecord>> {
        let conn = self.lock();
        let like = format!("{}%", escape_like(prefix));
        let mut stmt = conn
            .prepare(
                "SELECT o.id, o.bucket_id, o.name, o.size_bytes, o.etag, o.created_at, o.updated_at
                 FROM objects o JOIN buckets b ON o.bucket_id = b.id
                 WHERE b.name = ?1 AND o.name LIKE ?2 ESCAPE '\\'
                 ORDER BY o.name ASC",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map(params![bucket, like], map_object_row).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Delete an object row by `(bucket, name)`. Deleting a missing row is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a database error when the delete fails.
    pub fn delete_object(&self, bucket: &str, name: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM objects
             WHERE bucket_id = (SELECT id FROM buckets WHERE name = ?1) AND name = ?2",
            params![bucket, name],
        )
        .map_err(db_err)?;
        Ok(())
    }

    // === Multipart upload operations ===

    /// Insert a new multipart upload in state `initiated`.
    ///
    /// # Errors
    ///
    /// Returns `BUCKET_NOT_FOUND` when the bucket is absent.
    pub fn create_multipart_upload(
        &self,
        bucket: &str,
        upload_id: &str,
        object_name: &str,
        expires_at: &str,
    ) -> Result<MultipartUpload> {
        let bucket_row = self.get_bucket(bucket)?;
        {
            let conn = self.lock();
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO multipart_uploads
                     (upload_id, bucket_id, object_name, state, expires_at, created_at, updated_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    upload_id,
                    bucket_row.id,
                    object_name,
                    UploadState::Initiated.as_str(),
                    expires_at,
                    now
                ],
            )
            .map_err(db_err)?;
        }
        self.get_multipart_upload(upload_id)
    }

    /// Look up a multipart upload by its opaque id.
    ///
    /// # Errors
    ///
    /// Returns `UPLOAD_NOT_FOUND` when absent.
    pub fn get_multipart_upload(&self, upload_id: &str) -> Result<MultipartUpload> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, upload_id, bucket_id, object_name, state, expires_at, created_at, updated_at
             FROM multipart_uploads WHERE upload_id = ?1",
            params![upload_id],
            map_upload_row,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::api(ErrorCode::UploadNotFound, "multipart upload not found"))
    }

    /// Uploads in state `initiated` or `uploading` with `expires_at` before
    /// `cutoff`, ordered by `expires_at` ascending, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns a database error when the query fails.
    pub fn list_expired_multipart_uploads(
        &self,
        cutoff: &str,
        limit: u32,
    ) -> Result<Vec<MultipartUpload>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, upload_id, bucket_id, object_name, state, expires_at, created_at, updated_at
                 FROM multipart_uploads
                 WHERE state IN ('initiated', 'uploading') AND expires_at < ?1
                 ORDER BY expires_at ASC
                 LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map(params![cutoff, limit], map_upload_row).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Unconditionally write an upload's state. State-machine enforcement is
    /// the coordinator's job.
    ///
    /// # Errors
    ///
    /// Returns a database error when the update fails.
    pub fn update_multipart_upload_state(&self, upload_id: &str, state: UploadState) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE multipart_uploads SET state = ?1, updated_at = ?2 WHERE upload_id = ?3",
            params![state.as_str(), now_rfc3339(), upload_id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Delete an upload row. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns a database error when the delete fails.
    pub fn delete_multipart_upload(&self, upload_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM multipart_uploads WHERE upload_id = ?1", params![upload_id])
            .map_err(db_err)?;
        Ok(())
    }

    /// Insert or replace a part row. Re-uploading a part number replaces its
    /// size, etag, and temp path.
    ///
    /// # Errors
    ///
    /// Returns a database error when the upsert fails.
    pub fn upsert_multipart_part(
        &self,
        upload_id: &str,
        part_number: u32,
        size_bytes: u64,
        etag: &str,
        temp_path: &str,
    ) -> Result<MultipartPart> {
        {
            let conn = self.lock();
            conn.execute(
                "INSERT INTO multipart_parts
                     (upload_id, part_number, size_bytes, etag, temp_path, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(upload_id, part_number) DO UPDATE SET
                     size_bytes = excluded.size_bytes,
                     etag = excluded.etag,
                     temp_path = excluded.temp_path",
                params![upload_id, part_number, size_bytes as i64, etag, temp_path, now_rfc3339()],
            )
            .map_err(db_err)?;
        }
        let conn = self.lock();
        conn.query_row(
            "SELECT id, upload_id, part_number, size_bytes, etag, temp_path, created_at
             FROM multipart_parts WHERE upload_id = ?1 AND part_number = ?2",
            params![upload_id, part_number],
            map_part_row,
        )
        .map_err(db_err)
    }

    /// List an upload's parts ordered by part number ascending.
    ///
    /// # Errors
    ///
    /// Returns a database error when the query fails.
    pub fn list_multipart_parts(&self, upload_id: &str) -> Result<Vec<MultipartPart>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, upload_id, part_number, size_bytes, etag, temp_path, created_at
                 FROM multipart_parts WHERE upload_id = ?1 ORDER BY part_number ASC",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map(params![upload_id], map_part_row).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Delete all part rows of an upload. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns a database error when the delete fails.
    pub fn delete_multipart_parts(&self, upload_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM multipart_parts WHERE upload_id = ?1", params![upload_id])
            .map_err(db_err)?;
        Ok(())
    }
}

fn map_object_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectRecord> {
    let size: i64 = row.get(3)?;
    Ok(ObjectRecord {
        id: row.get(0)?,
        bucket_id: row.get(1)?,
        name: row.get(2)?,
        size_bytes: size as u64,
        etag: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_upload_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MultipartUpload> {
    let state: String = row.get(4)?;
    Ok(MultipartUpload {
        id: row.get(0)?,
        upload_id: row.get(1)?,
        bucket_id: row.get(2)?,
        object_name: row.get(3)?,
        // Rows are only ever written from UploadState::as_str.
        state: state.parse().unwrap_or(UploadState::Expired),
        expires_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_part_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MultipartPart> {
    let size: i64 = row.get(3)?;
    Ok(MultipartPart {
        id: row.get(0)?,
        upload_id: row.get(1)?,
        part_number: row.get(2)?,
        size_bytes: size as u64,
        etag: row.get(4)?,
        temp_path: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Escape LIKE wildcards so a prefix containing `_` matches literally.
fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use nebulafs_core::rfc3339_after_seconds;

    use super::*;

    fn test_store() -> SqliteMetadataStore {
        SqliteMetadataStore::open_in_memory().expect("failed to create in-memory store")
    }

    #[test]
    fn test_schema_idempotent() {
        let store = test_store();
        store.init_schema().expect("second init_schema failed");
    }

    #[test]
    fn test_bucket_create_get_list() {
        let store = test_store();
        let bucket = store.create_bucket("beta").unwrap();
        assert_eq!(bucket.name, "beta");
        assert!(bucket.id > 0);

        store.create_bucket("alpha").unwrap();

        let fetched = store.get_bucket("beta").unwrap();
        assert_eq!(fetched.id, bucket.id);

        let buckets = store.list_buckets().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].name, "alpha");
        assert_eq!(buckets[1].name, "beta");
    }

    #[test]
    fn test_bucket_duplicate_is_conflict() {
        let store = test_store();
        store.create_bucket("dup").unwrap();
        let err = store.create_bucket("dup").unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
    }

    #[test]
    fn test_bucket_missing_is_not_found() {
        let store = test_store();
        let err = store.get_bucket("nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BucketNotFound);
    }

    #[test]
    fn test_object_upsert_preserves_created_at() {
        let store = test_store();
        store.create_bucket("b").unwrap();

        let first = store.upsert_object("b", "o", 3, "abc").unwrap();
        let second = store.upsert_object("b", "o", 7, "def").unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.size_bytes, 7);
        assert_eq!(second.etag, "def");
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_object_get_and_delete() {
        let store = test_store();
        store.create_bucket("b").unwrap();
        store.upsert_object("b", "o", 1, "aa").unwrap();

        assert!(store.get_object("b", "o").is_ok());

        store.delete_object("b", "o").unwrap();
        let err = store.get_object("b", "o").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ObjectNotFound);

        // Deleting again is fine.
        store.delete_object("b", "o").unwrap();
    }

    #[test]
    fn test_list_objects_prefix_ordering() {
        let store = test_store();
        store.create_bucket("b").unwrap();
        for name in ["readme.txt", "read-only.md", "other.bin"] {
            store.upsert_object("b", name, 1, "aa").unwrap();
        }

        let all = store.list_objects("b", "").unwrap();
        assert_eq!(
            all.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            vec!["other.bin", "read-only.md", "readme.txt"]
        );

        let read = store.list_objects("b", "read").unwrap();
        assert_eq!(read.len(), 2);

        let none = store.list_objects("missing-bucket", "").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_list_objects_underscore_prefix_is_literal() {
        let store = test_store();
        store.create_bucket("b").unwrap();
        store.upsert_object("b", "a_b", 1, "aa").unwrap();
        store.upsert_object("b", "axb", 1, "aa").unwrap();

        let matched = store.list_objects("b", "a_").unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "a_b");
    }

    #[test]
    fn test_multipart_upload_lifecycle() {
        let store = test_store();
        store.create_bucket("b").unwrap();

        let expires = rfc3339_after_seconds(3600);
        let upload = store.create_multipart_upload("b", "u-1", "big.bin", &expires).unwrap();
        assert_eq!(upload.state, UploadState::Initiated);
        assert_eq!(upload.object_name, "big.bin");

        store.update_multipart_upload_state("u-1", UploadState::Uploading).unwrap();
        let upload = store.get_multipart_upload("u-1").unwrap();
        assert_eq!(upload.state, UploadState::Uploading);

        store.delete_multipart_upload("u-1").unwrap();
        let err = store.get_multipart_upload("u-1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UploadNotFound);
    }

    #[test]
    fn test_part_upsert_replaces() {
        let store = test_store();
        store.create_bucket("b").unwrap();
        let expires = rfc3339_after_seconds(3600);
        store.create_multipart_upload("b", "u-1", "big.bin", &expires).unwrap();

        store.upsert_multipart_part("u-1", 1, 5, "aaaa", "/tmp/p1").unwrap();
        let replaced = store.upsert_multipart_part("u-1", 1, 9, "bbbb", "/tmp/p1-v2").unwrap();
        assert_eq!(replaced.size_bytes, 9);
        assert_eq!(replaced.etag, "bbbb");
        assert_eq!(replaced.temp_path, "/tmp/p1-v2");

        store.upsert_multipart_part("u-1", 2, 3, "cccc", "/tmp/p2").unwrap();
        let parts = store.list_multipart_parts("u-1").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part_number, 1);
        assert_eq!(parts[1].part_number, 2);

        store.delete_multipart_parts("u-1").unwrap();
        assert!(store.list_multipart_parts("u-1").unwrap().is_empty());
    }

    #[test]
    fn test_expired_upload_scan() {
        let store = test_store();
        store.create_bucket("b").unwrap();

        store
            .create_multipart_upload("b", "old", "a.bin", &rfc3339_after_seconds(-600))
            .unwrap();
        store
            .create_multipart_upload("b", "older", "b.bin", &rfc3339_after_seconds(-1200))
            .unwrap();
        store
            .create_multipart_upload("b", "fresh", "c.bin", &rfc3339_after_seconds(600))
            .unwrap();
        // Terminal rows are never returned even when expired.
        store
            .create_multipart_upload("b", "done", "d.bin", &rfc3339_after_seconds(-600))
            .unwrap();
        store.update_multipart_upload_state("done", UploadState::Completed).unwrap();

        let cutoff = now_rfc3339();
        let expired = store.list_expired_multipart_uploads(&cutoff, 10).unwrap();
        let ids: Vec<_> = expired.iter().map(|u| u.upload_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "old"]);

        let limited = store.list_expired_multipart_uploads(&cutoff, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].upload_id, "older");
    }

    #[test]
    fn test_bucket_cascade_deletes_uploads_and_parts() {
        let store = test_store();
        store.create_bucket("b").unwrap();
        store
            .create_multipart_upload("b", "u-1", "x.bin", &rfc3339_after_seconds(3600))
            .unwrap();
        store.upsert_multipart_part("u-1", 1, 5, "aaaa", "/tmp/p1").unwrap();
        store.upsert_object("b", "o", 1, "aa").unwrap();

        {
            let conn = store.lock();
            conn.execute("DELETE FROM buckets WHERE name = 'b'", []).unwrap();
        }

        assert!(store.get_multipart_upload("u-1").is_err());
        assert!(store.list_multipart_parts("u-1").unwrap().is_empty());
        assert!(store.get_object("b", "o").is_err());
    }
}
