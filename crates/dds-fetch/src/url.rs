//! Catalog and download URL helpers.

use url::Url;

/// File name used when a download URL has no usable last path segment.
pub const FALLBACK_FILE_NAME: &str = "download.bin";

/// Builds the single-item URL.
///
/// URL format: `{domain}/dds/v1/item/{catalog}/{collection}/{archive}`
///
/// # Example
///
/// ```
/// use dds_fetch::url::item_url;
///
/// let url = item_url("https://example.org/", "EODMS", "RCMImageProducts", "1234");
/// assert_eq!(url, "https://example.org/dds/v1/item/EODMS/RCMImageProducts/1234");
/// ```
#[must_use]
pub fn item_url(domain: &str, catalog: &str, collection_id: &str, archive_id: &str) -> String {
    format!(
        "{}/dds/v1/item/{}/{}/{}",
        domain.trim_end_matches('/'),
        catalog,
        collection_id,
        archive_id
    )
}

/// Reads the authoritative expected byte count from a `size` query parameter.
#[must_use]
pub fn expected_size_from_url(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "size")
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Derives the destination file name from the last segment of the URL path.
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}
