pub mod publisher;

pub use publisher::{ActionLifecycleEvent, EventPublisher, PublishedEvent};
