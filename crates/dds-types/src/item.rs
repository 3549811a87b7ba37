//! Catalog item requests, records and status buckets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::DdsError;

/// Fallback archive id for ready records that carry no identifier.
const UNKNOWN_ARCHIVE_ID: &str = "unknown";

/// The minimal key needed to query one item from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    /// Collection the item belongs to (e.g., "RCMImageProducts").
    pub collection_id: String,
    /// Archive identifier of the item within its collection.
    pub archive_id: String,
}

impl ItemRequest {
    /// Creates a new item request.
    #[must_use]
    pub fn new(collection_id: impl Into<String>, archive_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            archive_id: archive_id.into(),
        }
    }
}

impl std::fmt::Display for ItemRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.collection_id, self.archive_id)
    }
}

/// Parses `COLLECTION:ARCHIVE`.
impl FromStr for ItemRequest {
    type Err = DdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((collection, archive))
                if !collection.trim().is_empty() && !archive.trim().is_empty() =>
            {
                Ok(Self::new(collection.trim(), archive.trim()))
            }
            _ => Err(DdsError::Resolution(format!(
                "expected COLLECTION:ARCHIVE, got '{s}'"
            ))),
        }
    }
}

/// Availability of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// The item can be downloaded now.
    Available,
    /// The item has been ordered and is waiting to be staged.
    Queued,
    /// Any other status string, or no status at all.
    Unknown,
}

impl ItemStatus {
    /// Classifies a raw catalog status string.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("Available") => Self::Available,
            Some("Queued") => Self::Queued,
            _ => Self::Unknown,
        }
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Queued => "Queued",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The raw attribute mapping the catalog returns for one item.
///
/// Records are created by the status poller from a response body and are
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRecord(Map<String, Value>);

impl ItemRecord {
    /// Wraps an attribute mapping.
    #[must_use]
    pub const fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Returns the full attribute mapping.
    #[must_use]
    pub const fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the raw value of an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a string attribute, treating empty strings as absent.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the item's availability.
    #[must_use]
    pub fn status(&self) -> ItemStatus {
        ItemStatus::from_raw(self.0.get("status").and_then(Value::as_str))
    }

    /// Returns the download URL, if the catalog provided one.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.str_field("download_url")
    }

    /// Returns the product identifier carried by the record.
    ///
    /// Checks `archiveId`, `datasetId` and `serviceUuid` in that order.
    #[must_use]
    pub fn archive_id(&self) -> Option<&str> {
        ["archiveId", "datasetId", "serviceUuid"]
            .into_iter()
            .find_map(|key| self.str_field(key))
    }

    /// Returns the product identifier, or `"unknown"` when none is present.
    #[must_use]
    pub fn archive_id_or_unknown(&self) -> &str {
        self.archive_id().unwrap_or(UNKNOWN_ARCHIVE_ID)
    }

    /// Consumes the record, returning the attribute mapping.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ItemRecord {
    fn from(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }
}

/// Items partitioned by status after a polling pass.
///
/// Every fetched record lands in exactly one bucket. Items that could not be
/// resolved or fetched are in none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemBuckets {
    /// Items with status `Available`.
    pub ready: Vec<ItemRecord>,
    /// Items with status `Queued`.
    pub queued: Vec<ItemRecord>,
    /// Items with any other status.
    pub unknown: Vec<ItemRecord>,
}

impl ItemBuckets {
    /// Creates empty buckets.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: Vec::new(),
            queued: Vec::new(),
            unknown: Vec::new(),
        }
    }

    /// Sorts a record into the bucket matching its status.
    pub fn push(&mut self, record: ItemRecord) -> ItemStatus {
        let status = record.status();
        match status {
            ItemStatus::Available => self.ready.push(record),
            ItemStatus::Queued => self.queued.push(record),
            ItemStatus::Unknown => self.unknown.push(record),
        }
        status
    }

    /// Returns the total number of bucketed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ready.len() + self.queued.len() + self.unknown.len()
    }

    /// Returns true if no record was bucketed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
