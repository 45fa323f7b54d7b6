//! # Abort Groups
//!
//! Correlated cancellation. Abortable actions join the current group when enqueued; children
//! inherit a parent's group through `Action::set_parent_action`. Starting a new abortable
//! transaction aborts every still-pending member of older groups.

pub mod coordinator;

pub use coordinator::{AbortGroupCoordinator, AbortGroupId};
