//! Pure grouping of raw events into `(date, country, event_type)` counts.
//!
//! Events whose timestamp is missing or unparseable are kept out of every
//! group and recorded as validation failures. Events are folded in one at a
//! time, so a streamed read never holds the whole raw log.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::models::{AggregatedSummary, EventType, RawLogEvent, SummaryKey};
use crate::utils::date::parse_event_date;

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    groups: BTreeMap<SummaryKey, i64>,
    invalid: Vec<ValidationError>,
    valid_events: usize,
    unknown_event_types: usize,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the running counts.
    pub fn push(&mut self, event: &RawLogEvent) {
        match summary_key(event) {
            Ok(key) => {
                if !EventType::is_known(&key.event_type) {
                    self.unknown_event_types += 1;
                }
                *self.groups.entry(key).or_insert(0) += 1;
                self.valid_events += 1;
            }
            Err(err) => {
                tracing::debug!(error = %err, "Excluding invalid event from aggregation");
                self.invalid.push(err);
            }
        }
    }

    pub fn summaries(&self) -> Vec<AggregatedSummary> {
        self.groups
            .iter()
            .map(|(key, count)| AggregatedSummary::new(key.clone(), *count))
            .collect()
    }

    pub fn invalid(&self) -> &[ValidationError] {
        &self.invalid
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_events
    }

    /// Valid events whose type is outside the known set. They are still grouped.
    pub fn unknown_event_types(&self) -> usize {
        self.unknown_event_types
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.invalid.is_empty()
    }
}

/// Derive the grouping key of one event.
pub fn summary_key(event: &RawLogEvent) -> Result<SummaryKey, ValidationError> {
    let raw = event
        .timestamp
        .as_deref()
        .ok_or(ValidationError::MissingTimestamp { id: event.id })?;

    let date = parse_event_date(raw).ok_or_else(|| ValidationError::MalformedTimestamp {
        id: event.id,
        value: raw.to_string(),
    })?;

    Ok(SummaryKey {
        date,
        country: event.country().to_string(),
        event_type: event.event_type.clone(),
    })
}

pub fn aggregate(events: &[RawLogEvent]) -> Aggregation {
    events.iter().fold(Aggregation::new(), |mut acc, event| {
        acc.push(event);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventMetadata, UNKNOWN_COUNTRY};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn event(id: i64, timestamp: Option<&str>, country: Option<&str>, event_type: &str) -> RawLogEvent {
        RawLogEvent {
            id,
            timestamp: timestamp.map(str::to_string),
            user_id: 100 + id,
            event_type: event_type.to_string(),
            message: "lorem ipsum".to_string(),
            metadata: Some(EventMetadata {
                ip: Some("10.0.0.1".to_string()),
                device: Some("PC".to_string()),
                country: country.map(str::to_string),
            }),
        }
    }

    fn jan_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn counts(aggregation: &Aggregation) -> Vec<(String, String, NaiveDate, i64)> {
        let mut out: Vec<_> = aggregation
            .summaries()
            .into_iter()
            .map(|s| (s.country, s.event_type, s.date, s.total_events))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let aggregation = aggregate(&[]);
        assert!(aggregation.is_empty());
        assert!(aggregation.summaries().is_empty());
        assert_eq!(aggregation.invalid_count(), 0);
    }

    #[test]
    fn groups_clicks_and_views() {
        let mut events = Vec::new();
        for id in 0..3 {
            events.push(event(id, Some("2025-01-01T08:00:00"), Some("US"), "click"));
        }
        for id in 3..5 {
            events.push(event(id, Some("2025-01-01T19:30:00.5"), Some("US"), "view"));
        }

        let aggregation = aggregate(&events);
        assert_eq!(
            aggregation.summaries(),
            vec![
                AggregatedSummary {
                    date: jan_first(),
                    country: "US".to_string(),
                    event_type: "click".to_string(),
                    total_events: 3,
                },
                AggregatedSummary {
                    date: jan_first(),
                    country: "US".to_string(),
                    event_type: "view".to_string(),
                    total_events: 2,
                },
            ]
        );
    }

    #[test]
    fn counts_add_up_to_input_size() {
        let events: Vec<_> = (0..40)
            .map(|id| {
                let day = format!("2025-01-0{}T12:00:00", id % 3 + 1);
                let country = ["US", "PL", "DE"][(id % 3) as usize];
                let kind = EventType::ALL[(id % 6) as usize].as_str();
                event(id, Some(&day), Some(country), kind)
            })
            .collect();

        let aggregation = aggregate(&events);
        let total: i64 = aggregation.summaries().iter().map(|s| s.total_events).sum();
        assert_eq!(total, 40);
        assert_eq!(aggregation.valid_count(), 40);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut events = vec![
            event(1, Some("2025-01-01"), Some("US"), "login"),
            event(2, Some("2025-01-02"), None, "login"),
            event(3, Some("2025-01-01"), Some("US"), "logout"),
            event(4, Some("2025-01-01"), Some("US"), "login"),
            event(5, Some("bogus"), Some("US"), "login"),
        ];
        let forward = aggregate(&events);
        events.reverse();
        let backward = aggregate(&events);

        assert_eq!(counts(&forward), counts(&backward));
        assert_eq!(forward.invalid_count(), backward.invalid_count());
    }

    #[test]
    fn missing_country_is_grouped_as_unknown() {
        let mut no_metadata = event(2, Some("2025-01-01"), None, "error");
        no_metadata.metadata = None;
        let events = vec![event(1, Some("2025-01-01"), None, "error"), no_metadata];

        let summaries = aggregate(&events).summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].country, UNKNOWN_COUNTRY);
        assert_eq!(summaries[0].total_events, 2);
    }

    #[test]
    fn invalid_timestamps_are_counted_not_grouped() {
        let events = vec![
            event(1, None, Some("US"), "click"),
            event(2, Some("last tuesday"), Some("US"), "click"),
            event(3, Some("2025-01-01T00:00:00"), Some("US"), "click"),
        ];

        let aggregation = aggregate(&events);
        assert_eq!(aggregation.invalid_count(), 2);
        assert_eq!(aggregation.valid_count(), 1);
        assert_eq!(
            aggregation.invalid(),
            &[
                ValidationError::MissingTimestamp { id: 1 },
                ValidationError::MalformedTimestamp {
                    id: 2,
                    value: "last tuesday".to_string()
                },
            ]
        );
        assert_eq!(aggregation.summaries()[0].total_events, 1);
    }

    #[test]
    fn all_invalid_still_yields_a_result() {
        let events = vec![event(1, None, Some("US"), "click"), event(2, Some(""), None, "view")];
        let aggregation = aggregate(&events);
        assert!(aggregation.summaries().is_empty());
        assert_eq!(aggregation.invalid_count(), 2);
    }

    #[test]
    fn unknown_event_types_are_kept_verbatim() {
        let events = vec![
            event(1, Some("2025-01-01"), Some("US"), "scroll"),
            event(2, Some("2025-01-01"), Some("US"), "scroll"),
            event(3, Some("2025-01-01"), Some("US"), "view"),
        ];
        let aggregation = aggregate(&events);
        assert_eq!(aggregation.unknown_event_types(), 2);
        assert!(aggregation
            .summaries()
            .iter()
            .any(|s| s.event_type == "scroll" && s.total_events == 2));
    }

    #[test]
    fn countries_differing_only_by_padding_stay_apart() {
        let events = vec![
            event(1, Some("2025-01-01"), Some("US"), "click"),
            event(2, Some("2025-01-01"), Some("US "), "click"),
            event(3, Some("2025-01-01"), Some(" "), "click"),
        ];
        let countries: Vec<_> = aggregate(&events)
            .summaries()
            .into_iter()
            .map(|s| (s.country, s.total_events))
            .collect();
        assert_eq!(
            countries,
            vec![
                ("US".to_string(), 1),
                ("US ".to_string(), 1),
                (UNKNOWN_COUNTRY.to_string(), 1),
            ]
        );
    }
}
