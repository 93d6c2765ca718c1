use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

/// Country value used when an event carries no usable `metadata.country`.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Optional context attached to a raw event. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl EventMetadata {
    /// Lenient decode from a stored JSON document. Anything that is not an
    /// object, and any field that is not a string, counts as absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| {
            obj.get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Some(Self {
            ip: field("ip"),
            device: field("device"),
            country: field("country"),
        })
    }
}

/// One observed action, as stored in `raw_logs`. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEvent {
    pub id: i64,
    /// Kept as received; parsed during aggregation.
    pub timestamp: Option<String>,
    pub user_id: i64,
    pub event_type: String,
    pub message: String,
    pub metadata: Option<EventMetadata>,
}

impl RawLogEvent {
    /// Grouping country: the metadata country, or [`UNKNOWN_COUNTRY`] when it
    /// is missing or blank. A non-blank value is used exactly as stored.
    pub fn country(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.country.as_deref())
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNKNOWN_COUNTRY)
    }
}

impl<'r> FromRow<'r, PgRow> for RawLogEvent {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let metadata: Option<serde_json::Value> = row.try_get("metadata")?;
        Ok(Self {
            id: row.try_get("id")?,
            timestamp: row.try_get("timestamp")?,
            user_id: row.try_get("user_id")?,
            event_type: row.try_get("event_type")?,
            message: row.try_get("message")?,
            metadata: metadata.as_ref().and_then(EventMetadata::from_json),
        })
    }
}

/// Insert payload for `raw_logs`; the store assigns `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLogEvent {
    pub timestamp: Option<String>,
    pub user_id: i64,
    pub event_type: String,
    pub message: String,
    pub metadata: Option<EventMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(metadata: Option<EventMetadata>) -> RawLogEvent {
        RawLogEvent {
            id: 1,
            timestamp: Some("2025-01-01T00:00:00".to_string()),
            user_id: 7,
            event_type: "click".to_string(),
            message: String::new(),
            metadata,
        }
    }

    #[test]
    fn country_falls_back_to_unknown() {
        assert_eq!(event_with(None).country(), UNKNOWN_COUNTRY);
        assert_eq!(event_with(Some(EventMetadata::default())).country(), UNKNOWN_COUNTRY);

        let blank = EventMetadata {
            country: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(event_with(Some(blank)).country(), UNKNOWN_COUNTRY);

        let us = EventMetadata {
            country: Some("US".to_string()),
            ..Default::default()
        };
        assert_eq!(event_with(Some(us)).country(), "US");
    }

    #[test]
    fn country_is_kept_verbatim_when_not_blank() {
        let padded = EventMetadata {
            country: Some("US ".to_string()),
            ..Default::default()
        };
        assert_eq!(event_with(Some(padded)).country(), "US ");
    }

    #[test]
    fn metadata_from_json_is_lenient() {
        let meta = EventMetadata::from_json(&json!({"ip": "10.0.0.1", "country": 42})).unwrap();
        assert_eq!(meta.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(meta.country, None);
        assert_eq!(meta.device, None);

        assert!(EventMetadata::from_json(&json!("not an object")).is_none());
        assert!(EventMetadata::from_json(&json!(null)).is_none());
    }
}
