//! Expected store layout and the column-subset gate.

use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::HashSet;

/// Table receiving one row per submitted query.
pub const QUERIES_TABLE: &str = "queries";

/// Table receiving one row per product.
pub const DOWNLOADS_TABLE: &str = "downloads";

/// Columns the `queries` table must have.
pub const QUERY_COLUMNS: &[&str] = &[
    "id",
    "constellation",
    "geometry_wkt",
    "start_date",
    "end_date",
    "parameters",
    "created_at",
];

/// Columns the `downloads` table must have.
pub const DOWNLOAD_COLUMNS: &[&str] = &[
    "product_id",
    "query_id",
    "constellation",
    "sensor_mode",
    "product_type",
    "processing_level",
    "status",
    "acquisition_time",
    "publication_time",
    "latency",
    "coordinates",
    "latitude",
    "longitude",
    "name",
    "quicklook",
    "file_path",
    "file_size_mb",
    "checksum",
    "created_at",
    "updated_at",
];

/// Returns the expected columns absent from `table`.
///
/// A missing table reports every column as missing.
pub(crate) async fn missing_columns(
    conn: &mut SqliteConnection,
    table: &str,
    expected: &[&'static str],
) -> Result<Vec<&'static str>, sqlx::Error> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(&mut *conn)
        .await?;

    let mut present = HashSet::with_capacity(rows.len());
    for row in rows {
        present.insert(row.try_get::<String, _>("name")?);
    }

    Ok(expected
        .iter()
        .copied()
        .filter(|col| !present.contains(*col))
        .collect())
}
