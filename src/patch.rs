use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{DraftData, FieldKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: FieldKey,
    pub message: String,
}

impl ValidationError {
    fn new(field: FieldKey, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePayload {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub street_address: String,
    pub lot_number: Option<String>,
}

/// Body of a single-field `PATCH /users/events` request.
///
/// Serializes as a one-key object, e.g. `{"title": "..."}`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FieldPatch {
    Title(String),
    Schedule(Option<SchedulePayload>),
    Location(Option<LocationPayload>),
    Capacity(Option<u32>),
    Price(Option<u32>),
    Playlist(String),
    Information(String),
}

impl FieldPatch {
    /// Validates `field` in `data` and captures the value to send.
    pub fn build(field: FieldKey, data: &DraftData) -> Result<Self, ValidationError> {
        match field {
            FieldKey::Title => {
                let title = data.title.trim();
                if title.is_empty() {
                    return Err(ValidationError::new(field, "event title is required"));
                }
                Ok(FieldPatch::Title(title.to_string()))
            }
            FieldKey::Schedule => {
                let schedule = data.schedule.ok_or_else(|| {
                    ValidationError::new(field, "event start and end time are required")
                })?;
                if schedule.end_at < schedule.start_at {
                    return Err(ValidationError::new(
                        field,
                        "event end time must not be before its start time",
                    ));
                }
                Ok(FieldPatch::Schedule(Some(SchedulePayload {
                    start_date: schedule.start_at,
                    end_date: schedule.end_at,
                })))
            }
            FieldKey::Location => {
                let street = data.location.street_address.trim();
                if street.is_empty() {
                    return Err(ValidationError::new(field, "street address is required"));
                }
                let lot_number = data
                    .location
                    .lot_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|lot| !lot.is_empty())
                    .map(str::to_string);
                Ok(FieldPatch::Location(Some(LocationPayload {
                    street_address: street.to_string(),
                    lot_number,
                })))
            }
            FieldKey::Capacity => Ok(FieldPatch::Capacity(data.capacity)),
            FieldKey::Price => Ok(FieldPatch::Price(data.price)),
            FieldKey::Playlist => Ok(FieldPatch::Playlist(
                data.playlist.clone().unwrap_or_default(),
            )),
            FieldKey::Information => Ok(FieldPatch::Information(
                data.information.clone().unwrap_or_default(),
            )),
        }
    }

    pub fn field(&self) -> FieldKey {
        match self {
            FieldPatch::Title(_) => FieldKey::Title,
            FieldPatch::Schedule(_) => FieldKey::Schedule,
            FieldPatch::Location(_) => FieldKey::Location,
            FieldPatch::Capacity(_) => FieldKey::Capacity,
            FieldPatch::Price(_) => FieldKey::Price,
            FieldPatch::Playlist(_) => FieldKey::Playlist,
            FieldPatch::Information(_) => FieldKey::Information,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, Schedule};
    use chrono::TimeZone;
    use serde_json::json;

    fn body(field: FieldKey, data: &DraftData) -> serde_json::Value {
        let patch = FieldPatch::build(field, data).expect("valid patch");
        assert_eq!(patch.field(), field);
        serde_json::to_value(patch).expect("serialize patch")
    }

    #[test]
    fn title_is_trimmed_and_required() {
        let mut data = DraftData {
            title: "  Night Market ".into(),
            ..Default::default()
        };
        assert_eq!(body(FieldKey::Title, &data), json!({ "title": "Night Market" }));

        data.title = "   ".into();
        let err = FieldPatch::build(FieldKey::Title, &data).unwrap_err();
        assert_eq!(err.field, FieldKey::Title);
        assert!(err.message.contains("title"));
    }

    #[test]
    fn schedule_serializes_iso_timestamps() {
        let start = Utc.with_ymd_and_hms(2025, 10, 8, 19, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 10, 8, 23, 30, 0).unwrap();
        let data = DraftData {
            schedule: Some(Schedule {
                start_at: start,
                end_at: end,
            }),
            ..Default::default()
        };
        assert_eq!(
            body(FieldKey::Schedule, &data),
            json!({
                "schedule": {
                    "startDate": "2025-10-08T19:00:00Z",
                    "endDate": "2025-10-08T23:30:00Z"
                }
            })
        );
    }

    #[test]
    fn schedule_requires_both_ends_in_order() {
        let data = DraftData::default();
        assert!(FieldPatch::build(FieldKey::Schedule, &data).is_err());

        let start = Utc.with_ymd_and_hms(2025, 10, 8, 19, 0, 0).unwrap();
        let data = DraftData {
            schedule: Some(Schedule {
                start_at: start,
                end_at: start - chrono::Duration::hours(1),
            }),
            ..Default::default()
        };
        let err = FieldPatch::build(FieldKey::Schedule, &data).unwrap_err();
        assert!(err.message.contains("end time"));
    }

    #[test]
    fn location_sends_null_lot_when_blank() {
        let data = DraftData {
            location: Location {
                street_address: "12 Harbor St".into(),
                lot_number: Some("  ".into()),
            },
            ..Default::default()
        };
        assert_eq!(
            body(FieldKey::Location, &data),
            json!({ "location": { "streetAddress": "12 Harbor St", "lotNumber": null } })
        );

        let empty = DraftData::default();
        let err = FieldPatch::build(FieldKey::Location, &empty).unwrap_err();
        assert!(err.message.contains("street address"));
    }

    #[test]
    fn optional_numbers_and_text_fields() {
        let data = DraftData {
            capacity: Some(120),
            information: Some("Bring a blanket".into()),
            ..Default::default()
        };
        assert_eq!(body(FieldKey::Capacity, &data), json!({ "capacity": 120 }));
        assert_eq!(body(FieldKey::Price, &data), json!({ "price": null }));
        assert_eq!(body(FieldKey::Playlist, &data), json!({ "playlist": "" }));
        assert_eq!(
            body(FieldKey::Information, &data),
            json!({ "information": "Bring a blanket" })
        );
    }
}
