use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type EventId = i64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub street_address: String,
    pub lot_number: Option<String>,
}

/// Display preference for the event title. Never sent to the backend.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FontType {
    #[default]
    Normal,
    Library,
    Thin,
}

/// The event being composed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DraftData {
    pub title: String,
    pub schedule: Option<Schedule>,
    pub location: Location,
    pub capacity: Option<u32>,
    pub price: Option<u32>,
    pub playlist: Option<String>,
    pub information: Option<String>,
    pub font_type: FontType,
    pub allow_external: bool,
    pub cover_image_url: Option<String>,
}

impl DraftData {
    pub fn apply(&mut self, update: DraftUpdate) {
        match update {
            DraftUpdate::Title(title) => self.title = title,
            DraftUpdate::Schedule(schedule) => self.schedule = schedule,
            DraftUpdate::Location(location) => self.location = location,
            DraftUpdate::Capacity(capacity) => self.capacity = capacity,
            DraftUpdate::Price(price) => self.price = price,
            DraftUpdate::Playlist(playlist) => self.playlist = playlist,
            DraftUpdate::Information(information) => self.information = information,
            DraftUpdate::FontType(font_type) => self.font_type = font_type,
            DraftUpdate::AllowExternal(allow) => self.allow_external = allow,
            DraftUpdate::CoverImageUrl(url) => self.cover_image_url = url,
        }
    }
}

/// A replacement value for one key of [`DraftData`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftUpdate {
    Title(String),
    Schedule(Option<Schedule>),
    Location(Location),
    Capacity(Option<u32>),
    Price(Option<u32>),
    Playlist(Option<String>),
    Information(Option<String>),
    FontType(FontType),
    AllowExternal(bool),
    CoverImageUrl(Option<String>),
}

impl DraftUpdate {
    /// The synchronized field this update touches, if any.
    pub fn field(&self) -> Option<FieldKey> {
        match self {
            DraftUpdate::Title(_) => Some(FieldKey::Title),
            DraftUpdate::Schedule(_) => Some(FieldKey::Schedule),
            DraftUpdate::Location(_) => Some(FieldKey::Location),
            DraftUpdate::Capacity(_) => Some(FieldKey::Capacity),
            DraftUpdate::Price(_) => Some(FieldKey::Price),
            DraftUpdate::Playlist(_) => Some(FieldKey::Playlist),
            DraftUpdate::Information(_) => Some(FieldKey::Information),
            DraftUpdate::FontType(_) | DraftUpdate::AllowExternal(_) | DraftUpdate::CoverImageUrl(_) => {
                None
            }
        }
    }
}

/// Fields whose value is synchronized with the remote draft.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    Title,
    Schedule,
    Location,
    Capacity,
    Price,
    Playlist,
    Information,
}

impl FieldKey {
    /// Every field, in save order.
    pub const ALL: [FieldKey; 7] = [
        FieldKey::Title,
        FieldKey::Schedule,
        FieldKey::Location,
        FieldKey::Capacity,
        FieldKey::Price,
        FieldKey::Playlist,
        FieldKey::Information,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Title => "title",
            FieldKey::Schedule => "schedule",
            FieldKey::Location => "location",
            FieldKey::Capacity => "capacity",
            FieldKey::Price => "price",
            FieldKey::Playlist => "playlist",
            FieldKey::Information => "information",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    #[default]
    Idle,
    Dirty,
    Saving,
    Saved,
    Error,
}

impl FieldStatus {
    pub fn is_unsaved(&self) -> bool {
        matches!(self, FieldStatus::Dirty | FieldStatus::Saving | FieldStatus::Error)
    }

    pub fn needs_save(&self) -> bool {
        matches!(self, FieldStatus::Dirty | FieldStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStatus::Idle => "idle",
            FieldStatus::Dirty => "dirty",
            FieldStatus::Saving => "saving",
            FieldStatus::Saved => "saved",
            FieldStatus::Error => "error",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Uniform response wrapper used by every backend call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Event resource returned by the draft and publish endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventResource {
    pub event_id: EventId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventResource {
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            status: None,
            extra: Map::new(),
        }
    }
}
