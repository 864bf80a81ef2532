use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

use crate::gateway::{EventGateway, GatewayError};
use crate::models::{
    DraftData, DraftUpdate, Envelope, EventId, EventResource, FieldKey, FieldStatus, InitStatus,
};
use crate::patch::{FieldPatch, ValidationError};
use crate::persist::{self, DraftStorage, PersistError, Snapshot};

const INIT_FAILED: &str = "failed to create event draft";
const PUBLISH_FAILED: &str = "failed to publish event";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("event draft has not been initialized")]
    NotInitialized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] GatewayError),
    #[error("event draft has unsaved changes")]
    UnsavedChanges,
}

/// Outcome of a [`DraftStore::save_all_dirty`] sweep that had failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{} field(s) failed to save", .failures.len())]
pub struct SaveAllError {
    pub saved: Vec<FieldKey>,
    pub failures: Vec<(FieldKey, DraftError)>,
}

#[derive(Default)]
struct State {
    snapshot: Snapshot,
    init_status: InitStatus,
    init_error: Option<String>,
    revisions: HashMap<FieldKey, u64>,
    // bumped by reset; responses from an earlier session are dropped
    session: u64,
}

impl State {
    fn status(&self, field: FieldKey) -> FieldStatus {
        self.snapshot
            .status
            .get(&field)
            .copied()
            .unwrap_or_default()
    }

    fn mark(&mut self, field: FieldKey, status: FieldStatus, error: Option<String>) {
        self.snapshot.status.insert(field, status);
        self.snapshot.error.insert(field, error);
    }

    fn revision(&self, field: FieldKey) -> u64 {
        self.revisions.get(&field).copied().unwrap_or(0)
    }
}

/// Event draft being composed, with per-field synchronization state.
///
/// One store is built per editing session and shared by reference. Every
/// mutation is written through to `storage`. The state lock is never held
/// across a gateway call, so operations may be driven concurrently.
pub struct DraftStore<G, S> {
    gateway: G,
    storage: S,
    state: Mutex<State>,
}

impl<G, S> DraftStore<G, S>
where
    G: EventGateway,
    S: DraftStorage,
{
    /// An empty store. Nothing is written until the first mutation.
    pub fn new(gateway: G, storage: S) -> Self {
        Self {
            gateway,
            storage,
            state: Mutex::new(State::default()),
        }
    }

    /// Rehydrates the store from `storage`, or starts empty if nothing is stored.
    ///
    /// A stored event id resumes that draft with `InitStatus::Ready`.
    pub fn open(gateway: G, storage: S) -> Result<Self, PersistError> {
        let mut state = State::default();
        if let Some(contents) = storage.load()? {
            state.snapshot = persist::deserialize(&contents)?;
            if state.snapshot.event_id.is_some() {
                state.init_status = InitStatus::Ready;
            }
            tracing::debug!(event_id = ?state.snapshot.event_id, "rehydrated event draft");
        }
        Ok(Self {
            gateway,
            storage,
            state: Mutex::new(state),
        })
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn data(&self) -> DraftData {
        self.state().snapshot.data.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot.clone()
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.state().snapshot.event_id
    }

    pub fn init_status(&self) -> InitStatus {
        self.state().init_status
    }

    pub fn init_error(&self) -> Option<String> {
        self.state().init_error.clone()
    }

    pub fn status(&self, field: FieldKey) -> FieldStatus {
        self.state().status(field)
    }

    pub fn error(&self, field: FieldKey) -> Option<String> {
        self.state().snapshot.error.get(&field).cloned().flatten()
    }

    pub fn statuses(&self) -> BTreeMap<FieldKey, FieldStatus> {
        self.state().snapshot.status.clone()
    }

    pub fn errors(&self) -> BTreeMap<FieldKey, Option<String>> {
        self.state().snapshot.error.clone()
    }

    /// True while any field is dirty, saving, or failed.
    pub fn has_unsaved(&self) -> bool {
        self.state()
            .snapshot
            .status
            .values()
            .any(FieldStatus::is_unsaved)
    }

    /// Creates the remote draft. A no-op while a draft is loading or ready.
    pub async fn init_draft(&self) -> InitStatus {
        let session = {
            let mut state = self.state();
            if matches!(state.init_status, InitStatus::Loading | InitStatus::Ready) {
                return state.init_status;
            }
            state.init_status = InitStatus::Loading;
            state.init_error = None;
            state.session
        };

        let result = self.gateway.create_draft().await;

        let mut state = self.state();
        if state.session != session {
            tracing::debug!("discarding draft creation from a reset session");
            return state.init_status;
        }
        match result {
            Ok(Envelope {
                success: true,
                data: Some(draft),
                ..
            }) => {
                tracing::info!(event_id = draft.event_id, "created event draft");
                state.snapshot.event_id = Some(draft.event_id);
                state.init_status = InitStatus::Ready;
            }
            Ok(envelope) => {
                let message = envelope.message.unwrap_or_else(|| INIT_FAILED.to_string());
                tracing::warn!("draft creation rejected: {message}");
                state.init_status = InitStatus::Error;
                state.init_error = Some(message);
            }
            Err(err) => {
                tracing::warn!("draft creation failed: {err}");
                state.init_status = InitStatus::Error;
                state.init_error = Some(INIT_FAILED.to_string());
            }
        }
        self.persist(&state);
        state.init_status
    }

    /// Stages a local change. Synchronized fields become dirty unless a save
    /// is in flight, in which case the save marks them dirty when it resolves.
    pub fn update(&self, update: DraftUpdate) {
        let mut state = self.state();
        let field = update.field();
        state.snapshot.data.apply(update);

        if let Some(field) = field {
            *state.revisions.entry(field).or_insert(0) += 1;
            let status = match state.status(field) {
                FieldStatus::Saving => FieldStatus::Saving,
                _ => FieldStatus::Dirty,
            };
            state.mark(field, status, None);
        }
        self.persist(&state);
    }

    /// Validates and pushes one field to the remote draft.
    ///
    /// Every failure leaves the field in `Error` with a message and is also
    /// returned to the caller. If the store is reset while the request is in
    /// flight, the outcome is returned but not recorded.
    pub async fn save_field(&self, field: FieldKey) -> Result<(), DraftError> {
        let (patch, revision, session) = {
            let mut state = self.state();
            if state.snapshot.event_id.is_none() {
                let err = DraftError::NotInitialized;
                state.mark(field, FieldStatus::Error, Some(err.to_string()));
                self.persist(&state);
                return Err(err);
            }

            state.mark(field, FieldStatus::Saving, None);
            let revision = state.revision(field);
            match FieldPatch::build(field, &state.snapshot.data) {
                Ok(patch) => {
                    self.persist(&state);
                    (patch, revision, state.session)
                }
                Err(err) => {
                    state.mark(field, FieldStatus::Error, Some(err.message.clone()));
                    self.persist(&state);
                    return Err(err.into());
                }
            }
        };

        let outcome = match self.gateway.patch_draft(&patch).await {
            Ok(envelope) if envelope.success => Ok(()),
            Ok(envelope) => Err(DraftError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| format!("failed to save {field}")),
            )),
            Err(err) => Err(DraftError::Transport(err)),
        };

        let mut state = self.state();
        if state.session != session {
            tracing::debug!(%field, "discarding save result from a reset session");
            return outcome;
        }
        match &outcome {
            Ok(()) => {
                tracing::debug!(%field, "saved draft field");
                state.mark(field, FieldStatus::Saved, None);
            }
            Err(err) => {
                tracing::warn!(%field, "failed to save draft field: {err}");
                state.mark(field, FieldStatus::Error, Some(err.to_string()));
            }
        }
        if state.revision(field) != revision {
            // edited while the request was in flight
            state.snapshot.status.insert(field, FieldStatus::Dirty);
        }
        self.persist(&state);
        outcome
    }

    /// Saves every dirty or failed field, one at a time in [`FieldKey::ALL`]
    /// order. A failure does not stop the sweep; all failures are reported
    /// together once every field has been attempted.
    pub async fn save_all_dirty(&self) -> Result<Vec<FieldKey>, SaveAllError> {
        let mut saved = Vec::new();
        let mut failures = Vec::new();

        for field in FieldKey::ALL {
            if !self.status(field).needs_save() {
                continue;
            }
            match self.save_field(field).await {
                Ok(()) => saved.push(field),
                Err(err) => failures.push((field, err)),
            }
        }

        if failures.is_empty() {
            Ok(saved)
        } else {
            Err(SaveAllError { saved, failures })
        }
    }

    /// Publishes the draft. Requires a ready draft with nothing left unsaved.
    pub async fn publish(&self) -> Result<EventResource, DraftError> {
        let event_id = {
            let state = self.state();
            let event_id = match (state.init_status, state.snapshot.event_id) {
                (InitStatus::Ready, Some(event_id)) => event_id,
                _ => return Err(DraftError::NotInitialized),
            };
            if state.snapshot.status.values().any(FieldStatus::is_unsaved) {
                return Err(DraftError::UnsavedChanges);
            }
            event_id
        };

        match self.gateway.publish(event_id).await {
            Ok(Envelope {
                success: true,
                data: Some(event),
                ..
            }) => {
                tracing::info!(event_id, "published event");
                Ok(event)
            }
            Ok(Envelope { success: true, .. }) => Err(DraftError::Transport(
                GatewayError::Decode("publish response is missing the event".to_string()),
            )),
            Ok(envelope) => {
                let message = envelope
                    .message
                    .unwrap_or_else(|| PUBLISH_FAILED.to_string());
                tracing::warn!(event_id, "publish rejected: {message}");
                Err(DraftError::Rejected(message))
            }
            Err(err) => {
                tracing::warn!(event_id, "publish failed: {err}");
                Err(DraftError::Transport(err))
            }
        }
    }

    /// Returns the store to an empty, uninitialized draft.
    pub fn reset(&self) {
        let mut state = self.state();
        let session = state.session + 1;
        *state = State {
            session,
            ..State::default()
        };
        self.persist(&state);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &State) {
        let written =
            persist::serialize(&state.snapshot).and_then(|contents| self.storage.save(&contents));
        if let Err(err) = written {
            tracing::warn!("failed to persist event draft: {err}");
        }
    }
}
