#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dronenode_bridge::{ActionDispatcher, DispatchConfig, PropertySink, StateCache};
use dronenode_fc::{CommandEncoder, CommandEnvelope, LinkError, ModeTable, SenderIdentity, Target, TelemetryLink};
use dronenode_proto::PropertyChange;
use serde_json::Value;
use tokio::time::Instant;

/// In-memory link: scripted telemetry, recorded posts.
#[derive(Default)]
pub struct FakeLink {
    pub posts: Mutex<Vec<(Instant, CommandEnvelope)>>,
    pub messages: Mutex<HashMap<String, Value>>,
    pub failing: Mutex<HashSet<String>>,
    pub reject_posts_with: Mutex<Option<u16>>,
    pub reads: Mutex<Vec<String>>,
}

impl FakeLink {
    pub fn set_message(&self, name: &str, msg: Value) {
        self.messages.lock().unwrap().insert(name.to_string(), msg);
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn sent(&self) -> Vec<CommandEnvelope> {
        self.posts.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn post_times(&self) -> Vec<Instant> {
        self.posts.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl TelemetryLink for FakeLink {
    async fn template(&self, name: &str) -> Result<Value, LinkError> {
        Ok(serde_json::json!({"header": {}, "message": {"type": name}}))
    }

    async fn last_message(&self, name: &str) -> Result<Option<Value>, LinkError> {
        self.reads.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Err(LinkError::Status {
                url: format!("http://m2r/v1/mavlink/vehicles/1/components/1/messages/{name}"),
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(self.messages.lock().unwrap().get(name).cloned())
    }

    async fn post(&self, envelope: &CommandEnvelope) -> Result<(), LinkError> {
        self.posts.lock().unwrap().push((Instant::now(), envelope.clone()));
        match *self.reject_posts_with.lock().unwrap() {
            Some(status) => Err(LinkError::Status {
                url: "http://m2r/v1/mavlink".into(),
                status,
                body: "link down".into(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub changes: Mutex<Vec<PropertyChange>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<PropertyChange> {
        std::mem::take(&mut *self.changes.lock().unwrap())
    }
}

impl PropertySink for RecordingSink {
    fn property_changed(&self, change: PropertyChange) {
        self.changes.lock().unwrap().push(change);
    }
}

pub struct Harness {
    pub link: Arc<FakeLink>,
    pub sink: Arc<RecordingSink>,
    pub cache: StateCache,
    pub modes: Arc<ModeTable>,
    pub dispatcher: ActionDispatcher,
}

pub fn harness() -> Harness {
    let link = Arc::new(FakeLink::default());
    let sink = Arc::new(RecordingSink::default());
    let cache = StateCache::new();
    let modes = Arc::new(ModeTable::arducopter());
    let encoder = CommandEncoder::new(
        link.clone(),
        SenderIdentity::default(),
        Target { system: 1, component: 1 },
        modes.clone(),
    );
    let dispatcher = ActionDispatcher::new(encoder, cache.clone(), sink.clone(), DispatchConfig::default());
    Harness { link, sink, cache, modes, dispatcher }
}
