use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::data::{ArtifactDirs, ImageRecord, SweepReport};

/// How long uploads and outputs are kept before the sweep removes them
pub const DEFAULT_RETENTION_SECS: i64 = 60 * 60;

/// The Library manages the SQLite record database.
/// It stores one row per uploaded or colorized file and owns the
/// expiry policy for both the rows and the files behind them.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
    dirs: ArtifactDirs,
    retention: Duration,
}

impl Library {
    /// Open (or create) the record database at `db_path`.
    pub fn open(db_path: &Path, dirs: ArtifactDirs) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;

        tracing::info!("📁 Database initialized at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
            dirs,
            retention: Duration::seconds(DEFAULT_RETENTION_SECS),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Create a throwaway in-memory database
    pub fn in_memory(dirs: ArtifactDirs) -> SqlResult<Self> {
        let library = Library {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
            dirs,
            retention: Duration::seconds(DEFAULT_RETENTION_SECS),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Override the retention window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Initialize the database schema.
    /// Creates the table and indexes if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        // upload_time is Unix milliseconds (UTC)
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                filename        TEXT NOT NULL,
                upload_time     INTEGER NOT NULL,
                output          INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_upload_time
             ON images(upload_time)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_filename
             ON images(filename, output)",
            [],
        )?;

        tracing::debug!("Database schema initialized");

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Directories holding the files this library tracks
    pub fn dirs(&self) -> &ArtifactDirs {
        &self.dirs
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Record a raw upload. Returns the new record ID.
    pub fn record_upload(&self, filename: &str) -> SqlResult<i64> {
        self.record_at(filename, false, Utc::now())
    }

    /// Record a colorized output. Call only after the file has been written.
    pub fn record_output(&self, filename: &str) -> SqlResult<i64> {
        self.record_at(filename, true, Utc::now())
    }

    /// Insert a record with an explicit timestamp
    pub fn record_at(&self, filename: &str, is_output: bool, at: DateTime<Utc>) -> SqlResult<i64> {
        self.conn.execute(
            "INSERT INTO images (filename, upload_time, output) VALUES (?1, ?2, ?3)",
            params![filename, at.timestamp_millis(), is_output],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Delete every record older than the retention window, together with
    /// its file.
    ///
    /// File removal is best-effort: failures are logged and skipped. A file
    /// that a younger record of the same kind still names (a re-upload under
    /// the same filename) is left alone. All row deletions commit as one
    /// transaction.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> SqlResult<SweepReport> {
        let cutoff = (now - self.retention).timestamp_millis();
        let tx = self.conn.transaction()?;

        let expired: Vec<(String, bool)> = {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT filename, output FROM images WHERE upload_time < ?1",
            )?;
            let rows = stmt.query_map([cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<SqlResult<_>>()?
        };

        let mut report = SweepReport::default();

        for (filename, is_output) in &expired {
            let still_referenced: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM images
                 WHERE filename = ?1 AND output = ?2 AND upload_time >= ?3)",
                params![filename, is_output, cutoff],
                |row| row.get(0),
            )?;
            if still_referenced {
                continue;
            }

            let path = self.dirs.path_for(filename, *is_output);
            match std::fs::remove_file(&path) {
                Ok(()) => report.files_removed += 1,
                Err(e) => tracing::debug!("Could not remove {}: {}", path.display(), e),
            }
        }

        report.records_removed = tx.execute("DELETE FROM images WHERE upload_time < ?1", [cutoff])?;
        tx.commit()?;

        if report.records_removed > 0 {
            tracing::info!(
                "🧹 Swept {} expired records ({} files)",
                report.records_removed,
                report.files_removed
            );
        }

        Ok(report)
    }

    /// Find the most recent output record for `filename`
    pub fn find_output_record(&self, filename: &str) -> SqlResult<Option<ImageRecord>> {
        self.conn
            .query_row(
                "SELECT id, filename, upload_time, output FROM images
                 WHERE filename = ?1 AND output = 1
                 ORDER BY upload_time DESC, id DESC
                 LIMIT 1",
                [filename],
                record_from_row,
            )
            .optional()
    }

    /// Delete a single record. Returns whether a row was removed.
    pub fn delete_record(&self, id: i64) -> SqlResult<bool> {
        let removed = self.conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    /// Whether any record of the given kind still names `filename`
    pub fn is_referenced(&self, filename: &str, is_output: bool) -> SqlResult<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM images WHERE filename = ?1 AND output = ?2)",
            params![filename, is_output],
            |row| row.get(0),
        )
    }

    /// Get a count of records in the library
    pub fn record_count(&self) -> SqlResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM images",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get all records, oldest first
    pub fn all_records(&self) -> SqlResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, upload_time, output FROM images ORDER BY upload_time, id",
        )?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(records)
    }

    /// Verify that output files still exist on disk.
    /// Deletes output records whose file is missing, so retrieval never
    /// points at a file that is gone.
    pub fn verify_outputs(&self) -> SqlResult<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename FROM images WHERE output = 1",
        )?;

        let outputs: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        let mut removed = 0;
        for (id, filename) in outputs {
            if !self.dirs.path_for(&filename, true).exists() {
                self.conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::warn!("⚠️  Removed {} output records with missing files", removed);
        }

        Ok(removed)
    }

    /// Delete files in the artifact directories that no record names.
    /// Leftovers from a crash between writing a file and recording it.
    pub fn remove_orphan_files(&self) -> SqlResult<usize> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT filename, output FROM images")?;
        let known: HashSet<(String, bool)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<SqlResult<_>>()?;

        let mut removed = 0;
        for is_output in [false, true] {
            let dir = self.dirs.dir_for(is_output);
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }

                let filename = entry.file_name().to_string_lossy().to_string();
                if known.contains(&(filename, is_output)) {
                    continue;
                }

                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::debug!("Could not remove {}: {}", entry.path().display(), e),
                }
            }
        }

        if removed > 0 {
            tracing::info!("🧹 Removed {} orphaned files", removed);
        }

        Ok(removed)
    }
}

fn record_from_row(row: &Row<'_>) -> SqlResult<ImageRecord> {
    let millis: i64 = row.get(2)?;
    Ok(ImageRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        upload_time: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
        is_output: row.get(3)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .field("dirs", &self.dirs)
            .field("retention", &self.retention)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Library) {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = ArtifactDirs::new(tmp.path().join("uploads"), tmp.path().join("outputs"));
        dirs.create_all().unwrap();
        let library = Library::in_memory(dirs).unwrap();
        (tmp, library)
    }

    fn touch(library: &Library, filename: &str, is_output: bool) -> PathBuf {
        let path = library.dirs().path_for(filename, is_output);
        std::fs::write(&path, b"pixels").unwrap();
        path
    }

    #[test]
    fn test_upload_then_output_creates_two_records() {
        let (_tmp, library) = setup();

        library.record_upload("photo.png").unwrap();
        assert!(library.find_output_record("photo.png").unwrap().is_none());

        library.record_output("photo.png").unwrap();
        let records = library.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].is_output);
        assert!(records[1].is_output);

        let found = library.find_output_record("photo.png").unwrap().unwrap();
        assert_eq!(found.filename, "photo.png");
        assert!(found.is_output);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (_tmp, mut library) = setup();
        let now = Utc::now();

        library.record_at("old.png", false, now - Duration::minutes(90)).unwrap();
        library.record_at("old.png", true, now - Duration::minutes(89)).unwrap();
        library.record_at("new.png", false, now - Duration::minutes(10)).unwrap();
        let old_upload = touch(&library, "old.png", false);
        let old_output = touch(&library, "old.png", true);
        let new_upload = touch(&library, "new.png", false);

        let report = library.sweep_expired(now).unwrap();

        assert_eq!(report.records_removed, 2);
        assert_eq!(report.files_removed, 2);
        assert!(!old_upload.exists());
        assert!(!old_output.exists());
        assert!(new_upload.exists());
        assert!(library.find_output_record("old.png").unwrap().is_none());
        assert!(library
            .all_records()
            .unwrap()
            .iter()
            .all(|r| r.upload_time >= now - Duration::seconds(DEFAULT_RETENTION_SECS)));
    }

    #[test]
    fn test_sweep_tolerates_missing_files() {
        let (_tmp, mut library) = setup();
        let now = Utc::now();
        library.record_at("gone.jpg", true, now - Duration::hours(2)).unwrap();

        let report = library.sweep_expired(now).unwrap();
        assert_eq!(report.records_removed, 1);
        assert_eq!(report.files_removed, 0);
        assert_eq!(library.record_count().unwrap(), 0);
    }

    #[test]
    fn test_sweep_keeps_file_of_newer_reupload() {
        let (_tmp, mut library) = setup();
        let now = Utc::now();
        library.record_at("same.png", false, now - Duration::hours(3)).unwrap();
        library.record_at("same.png", false, now - Duration::minutes(1)).unwrap();
        let path = touch(&library, "same.png", false);

        let report = library.sweep_expired(now).unwrap();
        assert_eq!(report.records_removed, 1);
        assert!(path.exists());
        assert_eq!(library.record_count().unwrap(), 1);
    }

    #[test]
    fn test_sweep_cutoff_is_exclusive() {
        let (_tmp, mut library) = setup();
        let now = Utc::now();
        let boundary = now - Duration::seconds(DEFAULT_RETENTION_SECS);

        library.record_at("edge.png", false, boundary).unwrap();
        library
            .record_at("past.png", false, boundary - Duration::milliseconds(1))
            .unwrap();
        let edge = touch(&library, "edge.png", false);

        let report = library.sweep_expired(now).unwrap();

        assert_eq!(report.records_removed, 1);
        assert!(edge.exists());
        let records = library.all_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "edge.png");
    }

    #[test]
    fn test_is_referenced() {
        let (_tmp, library) = setup();
        let id = library.record_upload("photo.png").unwrap();

        assert!(library.is_referenced("photo.png", false).unwrap());
        assert!(!library.is_referenced("photo.png", true).unwrap());
        assert!(!library.is_referenced("other.png", false).unwrap());

        library.delete_record(id).unwrap();
        assert!(!library.is_referenced("photo.png", false).unwrap());
    }

    #[test]
    fn test_custom_retention() {
        let (_tmp, library) = setup();
        let mut library = library.with_retention(Duration::minutes(5));
        let now = Utc::now();
        library.record_at("a.png", false, now - Duration::minutes(6)).unwrap();
        library.record_at("b.png", false, now - Duration::minutes(4)).unwrap();

        assert_eq!(library.sweep_expired(now).unwrap().records_removed, 1);
        assert_eq!(library.record_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_record() {
        let (_tmp, library) = setup();
        let id = library.record_upload("photo.png").unwrap();

        assert!(library.delete_record(id).unwrap());
        assert!(!library.delete_record(id).unwrap());
        assert_eq!(library.record_count().unwrap(), 0);
    }

    #[test]
    fn test_verify_outputs_drops_records_without_files() {
        let (_tmp, library) = setup();
        library.record_output("kept.png").unwrap();
        library.record_output("lost.png").unwrap();
        touch(&library, "kept.png", true);

        assert_eq!(library.verify_outputs().unwrap(), 1);
        assert!(library.find_output_record("kept.png").unwrap().is_some());
        assert!(library.find_output_record("lost.png").unwrap().is_none());
    }

    #[test]
    fn test_remove_orphan_files() {
        let (_tmp, library) = setup();
        library.record_upload("tracked.png").unwrap();
        let tracked = touch(&library, "tracked.png", false);
        let orphan = touch(&library, "orphan.png", false);
        // Same name but only recorded as an upload
        let orphan_output = touch(&library, "tracked.png", true);

        assert_eq!(library.remove_orphan_files().unwrap(), 2);
        assert!(tracked.exists());
        assert!(!orphan.exists());
        assert!(!orphan_output.exists());
    }

    #[test]
    fn test_open_persists_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = ArtifactDirs::new(tmp.path().join("u"), tmp.path().join("o"));
        let db_path = tmp.path().join("records.db");

        {
            let library = Library::open(&db_path, dirs.clone()).unwrap();
            library.record_output("photo.png").unwrap();
        }

        let reopened = Library::open(&db_path, dirs).unwrap();
        assert_eq!(reopened.path(), db_path.as_path());
        assert!(reopened.find_output_record("photo.png").unwrap().is_some());
    }
}
