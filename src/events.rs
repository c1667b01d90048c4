use serde::Serialize;
use tokio::sync::broadcast;

use crate::detection::FrameUpdate;
use crate::stats::Session;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum AppEvent {
    FrameProcessed(FrameUpdate),
    NoSignal,
    PostureAlert { title: String, body: String },
    SessionStarted { started_at: chrono::DateTime<chrono::Utc> },
    SessionCompleted { user_id: String, session: Session },
    SessionDiscarded { reason: String },
}

/// Fan-out of pipeline events to whoever is rendering them.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Returns false when nobody is listening.
    pub fn emit(&self, event: AppEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
