//! # Component Collaborator
//!
//! The narrow view of a rendering component that the dispatch core needs. An action may be
//! owned by a component; when that component is destroyed the action's callbacks and config
//! synchronization are suppressed.

use serde_json::Value;
use std::sync::Arc;

/// Handle to the component that owns an action or scopes a callback
pub trait ComponentHandle: Send + Sync {
    /// False once the component has been destroyed
    fn is_valid(&self) -> bool;

    /// Whether the component implements `capability` (e.g. the refresh observer interface)
    fn is_instance_of(&self, capability: &str) -> bool;

    /// Fire a named component event
    fn fire_event(&self, name: &str, params: &Value);

    /// Fire an event by its descriptor; returns false if the component does not declare it
    fn fire_event_by_descriptor(&self, _descriptor: &str, _params: &Value) -> bool {
        false
    }
}

/// Callback scope: the component a callback is bound to, if any
pub type CallbackScope = Option<Arc<dyn ComponentHandle>>;

/// Pointer identity for trait-object handles (vtable pointers are not compared)
pub fn same_component(a: &Arc<dyn ComponentHandle>, b: &Arc<dyn ComponentHandle>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

pub(crate) fn same_scope(a: &CallbackScope, b: &CallbackScope) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_component(a, b),
        _ => false,
    }
}
