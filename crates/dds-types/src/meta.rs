//! Product metadata recorded alongside download lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ItemRecord;

/// Constellation recorded when no other value is supplied.
pub const DEFAULT_CONSTELLATION: &str = "RCM";

/// Normalized metadata for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMeta {
    /// Satellite constellation.
    pub constellation: String,
    /// Beam mode mnemonic.
    pub sensor_mode: Option<String>,
    /// Product type (e.g., "GRD", "SLC").
    pub product_type: Option<String>,
    /// Processing level.
    pub processing_level: Option<String>,
    /// End of acquisition.
    pub acquisition_time: Option<DateTime<Utc>>,
    /// Time the product was published to the catalog.
    pub publication_time: Option<DateTime<Utc>>,
    /// Footprint coordinates as delivered by the catalog.
    pub coordinates: Option<Value>,
    /// Scene centre latitude.
    pub latitude: Option<f64>,
    /// Scene centre longitude.
    pub longitude: Option<f64>,
    /// Product title.
    pub name: Option<String>,
    /// Overview image URL.
    pub quicklook: Option<String>,
}

impl Default for ProductMeta {
    fn default() -> Self {
        Self {
            constellation: DEFAULT_CONSTELLATION.to_string(),
            sensor_mode: None,
            product_type: None,
            processing_level: None,
            acquisition_time: None,
            publication_time: None,
            coordinates: None,
            latitude: None,
            longitude: None,
            name: None,
            quicklook: None,
        }
    }
}

impl ProductMeta {
    /// Builds metadata from an item record and caller-supplied extras.
    ///
    /// Values in `extra` (typically the original search record) win over the
    /// item record.
    #[must_use]
    pub fn from_sources(item: &ItemRecord, extra: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            string_of(extra.get(key)).or_else(|| item.str_field(key).map(str::to_string))
        };
        let time = |key: &str| text(key).as_deref().and_then(parse_timestamp);

        let coordinates = match extra.get("geometry") {
            Some(Value::Object(geometry)) => geometry.get("coordinates").cloned(),
            _ => extra
                .get("coordinates")
                .or_else(|| item.get("coordinates"))
                .cloned(),
        }
        .filter(|v| !v.is_null());

        Self {
            constellation: text("constellation")
                .unwrap_or_else(|| DEFAULT_CONSTELLATION.to_string()),
            sensor_mode: text("beamMnemonic"),
            product_type: text("productType"),
            processing_level: text("processingLevel"),
            acquisition_time: time("acquisitionEndDate"),
            publication_time: time("last_update"),
            coordinates,
            latitude: extra.get("latitude").and_then(Value::as_f64),
            longitude: extra.get("longitude").and_then(Value::as_f64),
            name: text("title"),
            quicklook: text("overviewUrl"),
        }
    }

    /// Minutes between acquisition and publication, when both are known.
    #[must_use]
    pub fn latency_minutes(&self) -> Option<f64> {
        match (self.acquisition_time, self.publication_time) {
            (Some(acq), Some(publ)) => {
                Some((publ - acq).num_milliseconds() as f64 / 60_000.0)
            }
            _ => None,
        }
    }
}

fn string_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses an ISO-8601 timestamp, accepting a trailing `Z` or a naive time (UTC).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
