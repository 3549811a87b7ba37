//! The shadow store handle.

use dds_types::{DEFAULT_CONSTELLATION, ProductMeta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::checksum::file_stats;
use crate::schema::{DOWNLOAD_COLUMNS, DOWNLOADS_TABLE, QUERIES_TABLE, QUERY_COLUMNS, missing_columns};
use crate::ShadowError;

macro_rules! upsert_download {
    ($on_conflict:literal) => {
        concat!(
            "INSERT INTO downloads (
                product_id, query_id, constellation, sensor_mode, product_type, processing_level, status,
                acquisition_time, publication_time, latency, coordinates, latitude, longitude, name, quicklook,
                file_path, file_size_mb, checksum, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))
            ON CONFLICT(product_id) DO UPDATE SET ",
            $on_conflict
        )
    };
}

const UPSERT_IN_PROGRESS: &str = upsert_download!(
    "status = excluded.status, file_path = excluded.file_path, updated_at = datetime('now')"
);

const UPSERT_COMPLETED: &str = upsert_download!(
    "status = 'completed', file_path = excluded.file_path, file_size_mb = excluded.file_size_mb,
     checksum = excluded.checksum, publication_time = excluded.publication_time,
     acquisition_time = excluded.acquisition_time, latency = excluded.latency,
     updated_at = datetime('now')"
);

const UPSERT_FAILED: &str = upsert_download!(
    "status = 'failed', file_path = excluded.file_path, updated_at = datetime('now')"
);

const INSERT_QUERY: &str = "INSERT INTO queries
    (constellation, geometry_wkt, start_date, end_date, parameters, created_at)
    VALUES (?, ?, ?, ?, ?, datetime('now'))";

/// Lifecycle state stored in `downloads.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Download scheduled or running.
    InProgress,
    /// File verified in the completed directory.
    Completed,
    /// Retries exhausted.
    Failed,
}

impl DownloadStatus {
    /// Returns the stored string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single shadow write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Row written.
    Written,
    /// Store disabled; nothing attempted.
    Skipped,
    /// Write attempted and failed; the message is the underlying error.
    Failed(String),
}

impl WriteOutcome {
    /// Returns true if the row was written.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Search parameters recorded for a submitted query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Constellation searched; `RCM` when absent.
    #[serde(default)]
    pub constellation: Option<String>,
    /// Area of interest as WKT.
    #[serde(default)]
    pub geometry_wkt: Option<String>,
    /// Start of the search window.
    #[serde(default)]
    pub start_date: Option<String>,
    /// End of the search window.
    #[serde(default)]
    pub end_date: Option<String>,
    /// Any further search parameters, stored as JSON.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Optional write-through record of queries and downloads.
///
/// Cloning shares the underlying connection; writes are serialized.
#[derive(Debug, Clone, Default)]
pub struct ShadowStore {
    conn: Option<Arc<Mutex<SqliteConnection>>>,
}

impl ShadowStore {
    /// Returns a store that skips every write.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { conn: None }
    }

    /// Opens the store at `path`.
    ///
    /// Returns a disabled store if no path is given, the file does not exist,
    /// it cannot be opened, or either table lacks an expected column.
    pub async fn open(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::disabled();
        };
        if !path.is_file() {
            debug!(path = %path.display(), "Shadow store disabled: file not found");
            return Self::disabled();
        }

        match Self::connect(path).await {
            Ok(conn) => {
                debug!(path = %path.display(), "Shadow store enabled");
                Self {
                    conn: Some(Arc::new(Mutex::new(conn))),
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Shadow store disabled");
                Self::disabled()
            }
        }
    }

    async fn connect(path: &Path) -> Result<SqliteConnection, ShadowError> {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .busy_timeout(Duration::from_secs(5))
            .connect()
            .await?;

        for (table, expected) in [(QUERIES_TABLE, QUERY_COLUMNS), (DOWNLOADS_TABLE, DOWNLOAD_COLUMNS)] {
            let missing = missing_columns(&mut conn, table, expected).await?;
            if !missing.is_empty() {
                return Err(ShadowError::Schema {
                    table,
                    missing: missing.join(", "),
                });
            }
        }
        Ok(conn)
    }

    /// Returns true if writes are attempted.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Records a submitted query and returns its row id.
    pub async fn record_query(&self, query: &QueryContext) -> Option<i64> {
        let conn = self.conn.as_ref()?;
        let parameters = serde_json::to_string(&query.parameters).unwrap_or_else(|_| "{}".into());

        let mut conn = conn.lock().await;
        let result = sqlx::query(INSERT_QUERY)
            .bind(query.constellation.as_deref().unwrap_or(DEFAULT_CONSTELLATION))
            .bind(query.geometry_wkt.as_deref())
            .bind(query.start_date.as_deref())
            .bind(query.end_date.as_deref())
            .bind(parameters)
            .execute(&mut *conn)
            .await;

        match result {
            Ok(done) => Some(done.last_insert_rowid()),
            Err(e) => {
                debug!(error = %e, "record_query skipped");
                None
            }
        }
    }

    /// Marks a product as downloading.
    pub async fn mark_in_progress(
        &self,
        product_id: &str,
        query_id: Option<i64>,
        meta: &ProductMeta,
        file_path: &Path,
    ) -> WriteOutcome {
        let row = DownloadRow::new(product_id, query_id, meta, DownloadStatus::InProgress, file_path);
        self.write(UPSERT_IN_PROGRESS, row).await
    }

    /// Marks a product as downloaded, recording size, checksum and latency.
    pub async fn mark_success(
        &self,
        product_id: &str,
        query_id: Option<i64>,
        final_path: &Path,
        meta: &ProductMeta,
    ) -> WriteOutcome {
        if !self.is_enabled() {
            return WriteOutcome::Skipped;
        }
        let mut row = DownloadRow::new(product_id, query_id, meta, DownloadStatus::Completed, final_path);
        match file_stats(final_path).await {
            Ok((size, checksum)) => {
                row.file_size_mb = size;
                row.checksum = checksum;
            }
            Err(e) => warn!(error = %e, "Checksum worker failed"),
        }
        row.latency = meta.latency_minutes();
        self.write(UPSERT_COMPLETED, row).await
    }

    /// Marks a product as failed. `error` is logged, not stored.
    pub async fn mark_failed(
        &self,
        product_id: &str,
        query_id: Option<i64>,
        final_path: &Path,
        meta: &ProductMeta,
        error: &str,
    ) -> WriteOutcome {
        debug!(product_id, error, "Recording failed download");
        let row = DownloadRow::new(product_id, query_id, meta, DownloadStatus::Failed, final_path);
        self.write(UPSERT_FAILED, row).await
    }

    async fn write(&self, sql: &'static str, row: DownloadRow<'_>) -> WriteOutcome {
        let Some(conn) = self.conn.as_ref() else {
            return WriteOutcome::Skipped;
        };
        let status = row.status;
        let product_id = row.product_id;

        let mut conn = conn.lock().await;
        match row.bind(sqlx::query(sql)).execute(&mut *conn).await {
            Ok(_) => WriteOutcome::Written,
            Err(e) => {
                debug!(product_id, %status, error = %e, "Shadow write skipped");
                WriteOutcome::Failed(e.to_string())
            }
        }
    }
}

struct DownloadRow<'a> {
    product_id: &'a str,
    query_id: Option<i64>,
    meta: &'a ProductMeta,
    status: DownloadStatus,
    file_path: String,
    latency: Option<f64>,
    file_size_mb: Option<f64>,
    checksum: Option<String>,
}

impl<'a> DownloadRow<'a> {
    fn new(
        product_id: &'a str,
        query_id: Option<i64>,
        meta: &'a ProductMeta,
        status: DownloadStatus,
        file_path: &Path,
    ) -> Self {
        Self {
            product_id,
            query_id,
            meta,
            status,
            file_path: file_path.display().to_string(),
            latency: None,
            file_size_mb: None,
            checksum: None,
        }
    }

    fn bind<'q>(
        self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let meta = self.meta;
        query
            .bind(self.product_id.to_owned())
            .bind(self.query_id)
            .bind(meta.constellation.clone())
            .bind(meta.sensor_mode.clone())
            .bind(meta.product_type.clone())
            .bind(meta.processing_level.clone())
            .bind(self.status.as_str())
            .bind(meta.acquisition_time.map(|t| t.to_rfc3339()))
            .bind(meta.publication_time.map(|t| t.to_rfc3339()))
            .bind(self.latency)
            .bind(meta.coordinates.as_ref().map(Value::to_string))
            .bind(meta.latitude)
            .bind(meta.longitude)
            .bind(meta.name.clone())
            .bind(meta.quicklook.clone())
            .bind(self.file_path)
            .bind(self.file_size_mb)
            .bind(self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use sqlx::Connection;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SCHEMA: &str = "
        CREATE TABLE queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            constellation TEXT, geometry_wkt TEXT, start_date TEXT, end_date TEXT,
            parameters TEXT, created_at TEXT
        );
        CREATE TABLE downloads (
            product_id TEXT PRIMARY KEY, query_id INTEGER, constellation TEXT, sensor_mode TEXT,
            product_type TEXT, processing_level TEXT, status TEXT, acquisition_time TEXT,
            publication_time TEXT, latency REAL, coordinates TEXT, latitude REAL, longitude REAL,
            name TEXT, quicklook TEXT, file_path TEXT, file_size_mb REAL, checksum TEXT,
            created_at TEXT, updated_at TEXT, notes TEXT
        );";

    async fn create_db(dir: &TempDir, ddl: &str) -> PathBuf {
        let path = dir.path().join("rcm.db");
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::raw_sql(ddl).execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();
        path
    }

    async fn reader(path: &Path) -> SqliteConnection {
        SqliteConnectOptions::new().filename(path).connect().await.unwrap()
    }

    fn meta() -> ProductMeta {
        ProductMeta {
            sensor_mode: Some("SC50MA".into()),
            acquisition_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            publication_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap()),
            coordinates: Some(json!([[1.0, 2.0], [3.0, 4.0]])),
            ..ProductMeta::default()
        }
    }

    #[tokio::test]
    async fn test_open_without_path_is_disabled() {
        let store = ShadowStore::open(None).await;
        assert!(!store.is_enabled());
        assert_eq!(
            store
                .mark_in_progress("A1", None, &meta(), Path::new("/tmp/a"))
                .await,
            WriteOutcome::Skipped
        );
        assert_eq!(store.record_query(&QueryContext::default()).await, None);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");
        let store = ShadowStore::open(Some(&path)).await;
        assert!(!store.is_enabled());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_downloads_table_disables_store() {
        let dir = TempDir::new().unwrap();
        let path = create_db(
            &dir,
            "CREATE TABLE queries (id INTEGER PRIMARY KEY, constellation TEXT, geometry_wkt TEXT,
             start_date TEXT, end_date TEXT, parameters TEXT, created_at TEXT);",
        )
        .await;
        let store = ShadowStore::open(Some(&path)).await;
        assert!(!store.is_enabled());
    }

    #[tokio::test]
    async fn test_missing_column_disables_store() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, &SCHEMA.replace("checksum TEXT,", "")).await;
        assert!(!ShadowStore::open(Some(&path)).await.is_enabled());
    }

    #[tokio::test]
    async fn test_record_query() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, SCHEMA).await;
        let store = ShadowStore::open(Some(&path)).await;
        assert!(store.is_enabled());

        let mut query = QueryContext {
            geometry_wkt: Some("POINT (-75.7 45.4)".into()),
            ..QueryContext::default()
        };
        query.parameters.insert("beam".into(), json!("SC50MA"));

        assert_eq!(store.record_query(&query).await, Some(1));
        assert_eq!(store.record_query(&query).await, Some(2));

        let mut conn = reader(&path).await;
        let (constellation, parameters): (String, String) =
            sqlx::query_as("SELECT constellation, parameters FROM queries WHERE id = 1")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(constellation, "RCM");
        assert_eq!(parameters, r#"{"beam":"SC50MA"}"#);
    }

    #[tokio::test]
    async fn test_lifecycle_upserts_single_row() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, SCHEMA).await;
        let store = ShadowStore::open(Some(&path)).await;

        let file = dir.path().join("product.zip");
        std::fs::write(&file, b"hello world").unwrap();

        let meta = meta();
        assert!(store.mark_in_progress("A1", Some(7), &meta, &file).await.is_written());
        assert!(store.mark_in_progress("A1", Some(7), &meta, &file).await.is_written());
        assert!(store.mark_success("A1", Some(7), &file, &meta).await.is_written());

        let mut conn = reader(&path).await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let (status, checksum, latency, size, coords): (String, String, f64, f64, String) =
            sqlx::query_as(
                "SELECT status, checksum, latency, file_size_mb, coordinates FROM downloads WHERE product_id = 'A1'",
            )
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(status, "completed");
        assert_eq!(checksum, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert!((latency - 90.0).abs() < 1e-9);
        assert!((size - 11.0 / (1024.0 * 1024.0)).abs() < 1e-12);
        assert_eq!(coords, "[[1.0,2.0],[3.0,4.0]]");
    }

    #[tokio::test]
    async fn test_mark_failed_transitions_status() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, SCHEMA).await;
        let store = ShadowStore::open(Some(&path)).await;
        let file = dir.path().join("missing.zip");

        store.mark_in_progress("A2", None, &meta(), &file).await;
        let outcome = store
            .mark_failed("A2", None, &file, &meta(), "Size mismatch")
            .await;
        assert_eq!(outcome, WriteOutcome::Written);

        let mut conn = reader(&path).await;
        let (status, checksum): (String, Option<String>) =
            sqlx::query_as("SELECT status, checksum FROM downloads WHERE product_id = 'A2'")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(checksum, None);
    }

    #[tokio::test]
    async fn test_success_without_file_records_nulls() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, SCHEMA).await;
        let store = ShadowStore::open(Some(&path)).await;

        let outcome = store
            .mark_success("A3", None, &dir.path().join("gone.zip"), &ProductMeta::default())
            .await;
        assert!(outcome.is_written());

        let mut conn = reader(&path).await;
        let (size, latency): (Option<f64>, Option<f64>) =
            sqlx::query_as("SELECT file_size_mb, latency FROM downloads WHERE product_id = 'A3'")
                .fetch_one(&mut conn)
                .await
                .unwrap();
        assert_eq!(size, None);
        assert_eq!(latency, None);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = create_db(&dir, SCHEMA).await;
        let store = ShadowStore::open(Some(&path)).await;

        let mut conn = reader(&path).await;
        sqlx::raw_sql("DROP TABLE downloads").execute(&mut conn).await.unwrap();
        conn.close().await.unwrap();

        let outcome = store
            .mark_in_progress("A4", None, &meta(), Path::new("/tmp/a"))
            .await;
        assert!(matches!(outcome, WriteOutcome::Failed(_)));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(DownloadStatus::InProgress.to_string(), "in_progress");
        assert_eq!(DownloadStatus::Completed.as_str(), "completed");
    }
}
