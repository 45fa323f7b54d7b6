use crate::abort::AbortGroupId;
use crate::action::ActionState;
use crate::constants::events;
use crate::dispatch::Partition;
use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle event emitted by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActionLifecycleEvent {
    Enqueued {
        action_id: String,
        descriptor: String,
        partition: Option<Partition>,
    },
    CacheHit {
        action_id: String,
        storage_key: String,
    },
    BatchSent {
        partition: Partition,
        action_ids: Vec<String>,
    },
    Completed {
        action_id: String,
        state: ActionState,
        from_storage: bool,
    },
    Aborted {
        action_id: String,
        abortable_id: Option<AbortGroupId>,
    },
    FailureReported {
        failed_action: String,
        failed_id: String,
    },
}

impl ActionLifecycleEvent {
    /// Dotted event name, e.g. `action.completed`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => events::ACTION_ENQUEUED,
            Self::CacheHit { .. } => events::ACTION_CACHE_HIT,
            Self::BatchSent { .. } => events::BATCH_SENT,
            Self::Completed { .. } => events::ACTION_COMPLETED,
            Self::Aborted { .. } => events::ACTION_ABORTED,
            Self::FailureReported { .. } => events::FAILURE_REPORTED,
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: ActionLifecycleEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Broadcast publisher for action lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: ActionLifecycleEvent) {
        let published = PublishedEvent {
            event,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(published);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
