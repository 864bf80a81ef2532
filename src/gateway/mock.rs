use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use crate::gateway::{EventGateway, GatewayError, GatewayResult};
use crate::models::{Envelope, EventId, EventResource, FieldKey};
use crate::patch::FieldPatch;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateDraft,
    Patch(FieldPatch),
    Publish(EventId),
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Success,
    Rejected(String),
    Transport(String),
}

pub(crate) struct MockGateway {
    pub(crate) event_id: EventId,
    calls: Mutex<Vec<Call>>,
    create_reply: Mutex<Reply>,
    patch_replies: Mutex<HashMap<FieldKey, Reply>>,
    publish_reply: Mutex<Reply>,
    hold: Option<Arc<Notify>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            event_id: 101,
            calls: Mutex::new(Vec::new()),
            create_reply: Mutex::new(Reply::Success),
            patch_replies: Mutex::new(HashMap::new()),
            publish_reply: Mutex::new(Reply::Success),
            hold: None,
        }
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patches wait on the returned handle before replying.
    pub fn held() -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        let gateway = Self {
            hold: Some(notify.clone()),
            ..Default::default()
        };
        (gateway, notify)
    }

    pub fn reply_to_create(&self, reply: Reply) {
        *self.create_reply.lock().unwrap() = reply;
    }

    pub fn reply_to_patch(&self, field: FieldKey, reply: Reply) {
        self.patch_replies.lock().unwrap().insert(field, reply);
    }

    pub fn reply_to_publish(&self, reply: Reply) {
        *self.publish_reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn patched_fields(&self) -> Vec<FieldKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Patch(patch) => Some(patch.field()),
                _ => None,
            })
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::CreateDraft))
            .count()
    }

    fn respond(&self, reply: Reply) -> GatewayResult {
        match reply {
            Reply::Success => Ok(Envelope::ok(EventResource::new(self.event_id))),
            Reply::Rejected(message) => Ok(Envelope::rejected(message)),
            Reply::Transport(message) => Err(GatewayError::Transport(message)),
        }
    }
}

impl EventGateway for MockGateway {
    fn create_draft(&self) -> BoxFuture<'_, GatewayResult> {
        async move {
            self.calls.lock().unwrap().push(Call::CreateDraft);
            tokio::task::yield_now().await;
            let reply = self.create_reply.lock().unwrap().clone();
            self.respond(reply)
        }
        .boxed()
    }

    fn patch_draft<'a>(&'a self, patch: &'a FieldPatch) -> BoxFuture<'a, GatewayResult> {
        async move {
            self.calls.lock().unwrap().push(Call::Patch(patch.clone()));
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            let reply = self
                .patch_replies
                .lock()
                .unwrap()
                .get(&patch.field())
                .cloned()
                .unwrap_or(Reply::Success);
            self.respond(reply)
        }
        .boxed()
    }

    fn publish(&self, event_id: EventId) -> BoxFuture<'_, GatewayResult> {
        async move {
            self.calls.lock().unwrap().push(Call::Publish(event_id));
            let reply = self.publish_reply.lock().unwrap().clone();
            self.respond(reply)
        }
        .boxed()
    }
}
