use std::{sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;

use crate::config::ConfigStore;
use crate::models::{Envelope, EventId, EventResource};
use crate::patch::FieldPatch;

#[cfg(test)]
pub(crate) mod mock;

const USER_AGENT: &str = "event-draft/0.1";

pub type GatewayResult = Result<Envelope<EventResource>, GatewayError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Transport(String),
    #[error("unexpected response ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("response parse error: {0}")]
    Decode(String),
}

/// Supplies the bearer credential attached to every backend request.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed credential, or none at all.
#[cfg(test)]
pub(crate) struct StaticToken(pub Option<String>);

#[cfg(test)]
impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The backend's draft endpoints.
pub trait EventGateway: Send + Sync {
    /// `POST /users/events`
    fn create_draft(&self) -> BoxFuture<'_, GatewayResult>;

    /// `PATCH /users/events` with a single-field body.
    fn patch_draft<'a>(&'a self, patch: &'a FieldPatch) -> BoxFuture<'a, GatewayResult>;

    /// `POST /users/events/{eventId}/published`
    fn publish(&self, event_id: EventId) -> BoxFuture<'_, GatewayResult>;
}

/// Gateway that talks JSON over HTTP.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpGateway {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: Arc<ConfigStore>) -> Result<Self, GatewayError> {
        let effective = config.effective();
        Self::new(effective.base_url(), effective.request_timeout(), config)
    }

    fn events_url(&self) -> String {
        format!("{}/users/events", self.base_url)
    }

    fn publish_url(&self, event_id: EventId) -> String {
        format!("{}/users/events/{}/published", self.base_url, event_id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn create_request(&self) -> RequestBuilder {
        self.authorized(self.client.post(self.events_url()))
    }

    fn patch_request(&self, patch: &FieldPatch) -> RequestBuilder {
        self.authorized(self.client.patch(self.events_url()).json(patch))
    }

    fn publish_request(&self, event_id: EventId) -> RequestBuilder {
        self.authorized(self.client.post(self.publish_url(event_id)))
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult {
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        decode_envelope(status, &body)
    }
}

impl EventGateway for HttpGateway {
    fn create_draft(&self) -> BoxFuture<'_, GatewayResult> {
        tracing::debug!(url = %self.events_url(), "creating draft");
        self.send(self.create_request()).boxed()
    }

    fn patch_draft<'a>(&'a self, patch: &'a FieldPatch) -> BoxFuture<'a, GatewayResult> {
        tracing::debug!(url = %self.events_url(), field = %patch.field(), "patching draft");
        self.send(self.patch_request(patch)).boxed()
    }

    fn publish(&self, event_id: EventId) -> BoxFuture<'_, GatewayResult> {
        tracing::debug!(url = %self.publish_url(event_id), event_id, "publishing draft");
        self.send(self.publish_request(event_id)).boxed()
    }
}

/// Decodes a response body. An envelope is returned whatever the HTTP status,
/// since rejections are reported through it.
pub(crate) fn decode_envelope(status: StatusCode, body: &str) -> GatewayResult {
    match serde_json::from_str::<Envelope<EventResource>>(body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(GatewayError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        }),
        Err(err) => Err(GatewayError::Decode(err.to_string())),
    }
}
