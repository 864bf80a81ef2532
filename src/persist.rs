use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    DraftData, EventId, FieldKey, FieldStatus, FontType, Location, Schedule,
};
use crate::utils;

/// Version tag written into every persisted record.
pub const STORAGE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed draft record: {0}")]
    Malformed(String),
    #[error("unsupported draft record version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid {field} timestamp {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// The persisted part of a draft store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub data: DraftData,
    pub status: BTreeMap<FieldKey, FieldStatus>,
    pub error: BTreeMap<FieldKey, Option<String>>,
    pub event_id: Option<EventId>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            data: DraftData::default(),
            status: idle_statuses(),
            error: empty_errors(),
            event_id: None,
        }
    }
}

pub fn idle_statuses() -> BTreeMap<FieldKey, FieldStatus> {
    FieldKey::ALL
        .iter()
        .map(|field| (*field, FieldStatus::Idle))
        .collect()
}

pub fn empty_errors() -> BTreeMap<FieldKey, Option<String>> {
    FieldKey::ALL.iter().map(|field| (*field, None)).collect()
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    version: u32,
    data: RecordData,
    #[serde(default)]
    status: BTreeMap<FieldKey, FieldStatus>,
    #[serde(default)]
    error: BTreeMap<FieldKey, Option<String>>,
    event_id: Option<EventId>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordData {
    title: String,
    schedule: Option<RecordSchedule>,
    location: Location,
    capacity: Option<u32>,
    price: Option<u32>,
    playlist: Option<String>,
    information: Option<String>,
    #[serde(default)]
    font_type: FontType,
    #[serde(default)]
    allow_external: bool,
    cover_image_url: Option<String>,
}

/// Schedule with timestamps kept as RFC 3339 text.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSchedule {
    start_at: String,
    end_at: String,
}

pub fn serialize(snapshot: &Snapshot) -> Result<String, PersistError> {
    let data = &snapshot.data;
    let record = Record {
        version: STORAGE_VERSION,
        data: RecordData {
            title: data.title.clone(),
            schedule: data.schedule.map(|schedule| RecordSchedule {
                start_at: schedule.start_at.to_rfc3339(),
                end_at: schedule.end_at.to_rfc3339(),
            }),
            location: data.location.clone(),
            capacity: data.capacity,
            price: data.price,
            playlist: data.playlist.clone(),
            information: data.information.clone(),
            font_type: data.font_type,
            allow_external: data.allow_external,
            cover_image_url: data.cover_image_url.clone(),
        },
        status: snapshot.status.clone(),
        error: snapshot.error.clone(),
        event_id: snapshot.event_id,
    };
    serde_json::to_string(&record).map_err(|err| PersistError::Malformed(err.to_string()))
}

/// Rebuilds a snapshot from a persisted record.
///
/// Schedule timestamps are revived into `DateTime<Utc>`. Fields absent from the
/// status or error maps come back idle, and a field persisted mid-save comes
/// back dirty because no request survives a reload.
pub fn deserialize(contents: &str) -> Result<Snapshot, PersistError> {
    let record: Record =
        serde_json::from_str(contents).map_err(|err| PersistError::Malformed(err.to_string()))?;
    if record.version != STORAGE_VERSION {
        return Err(PersistError::UnsupportedVersion(record.version));
    }

    let raw = record.data;
    let schedule = match raw.schedule {
        Some(schedule) => Some(Schedule {
            start_at: revive_timestamp("startAt", &schedule.start_at)?,
            end_at: revive_timestamp("endAt", &schedule.end_at)?,
        }),
        None => None,
    };

    let data = DraftData {
        title: raw.title,
        schedule,
        location: raw.location,
        capacity: raw.capacity,
        price: raw.price,
        playlist: raw.playlist,
        information: raw.information,
        font_type: raw.font_type,
        allow_external: raw.allow_external,
        cover_image_url: raw.cover_image_url,
    };

    let mut status = idle_statuses();
    for (field, value) in record.status {
        let value = match value {
            FieldStatus::Saving => FieldStatus::Dirty,
            other => other,
        };
        status.insert(field, value);
    }

    let mut error = empty_errors();
    error.extend(record.error);

    Ok(Snapshot {
        data,
        status,
        error,
        event_id: record.event_id,
    })
}

fn revive_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, PersistError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PersistError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

/// Durable home of the single persisted draft record.
pub trait DraftStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, PersistError>;
    fn save(&self, contents: &str) -> Result<(), PersistError>;
    fn clear(&self) -> Result<(), PersistError>;
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Self {
        Self::new(utils::draft_path())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl DraftStorage for FileStorage {
    fn load(&self) -> Result<Option<String>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&self, contents: &str) -> Result<(), PersistError> {
        utils::ensure_parent(&self.path)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }
}

impl DraftStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, PersistError> {
        Ok(self
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, contents: &str) -> Result<(), PersistError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
