//! # Dispatch
//!
//! Queueing, batching and transport of actions. See [`ActionDispatcher`] for the cycle.

pub mod dispatcher;
pub mod queue;
pub mod transport;

pub use dispatcher::{ActionDispatcher, CycleStats, EnqueueOutcome};
pub use queue::{ActionQueue, Partition};
pub use transport::{ActionRequest, ActionResponse, ActionTransport, TransportBatch, TransportError};
