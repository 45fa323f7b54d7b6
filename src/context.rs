//! # Execution Context
//!
//! The context collaborator tracks which action is currently finishing, which component has
//! access, and the component configurations a response produced. `finish_action` calls either
//! [`ExecutionContext::finish_component_configs`] or
//! [`ExecutionContext::clear_component_configs`] exactly once, chosen by the action's
//! `storable` flag.

use crate::component::ComponentHandle;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ExecutionContext: Send + Sync {
    /// Context sequence number combined with the action counter to form action ids
    fn num(&self) -> String;

    /// Set the action being finished; returns the previous one so it can be restored
    fn set_current_action(&self, action_id: Option<String>) -> Option<String>;

    fn set_current_access(&self, component: Option<&Arc<dyn ComponentHandle>>);

    fn release_current_access(&self);

    /// Stage component configs produced by the response of `action_id`
    fn join_component_configs(&self, configs: &[Value], action_id: &str);

    /// Commit staged configs for `action_id`
    fn finish_component_configs(&self, action_id: &str);

    /// Discard staged configs for `action_id`
    fn clear_component_configs(&self, action_id: &str);

    /// Fallback for response events no component claimed
    fn fire_application_event(&self, event: &Value);
}

#[derive(Debug, Default)]
struct ContextState {
    current_action: Option<String>,
    access_depth: usize,
    pending: HashMap<String, Vec<Value>>,
    committed: Vec<Value>,
    finished: Vec<String>,
    cleared: Vec<String>,
    application_events: Vec<Value>,
}

/// In-process execution context that keeps component configs in memory
#[derive(Debug)]
pub struct InMemoryExecutionContext {
    num: String,
    state: Mutex<ContextState>,
}

impl InMemoryExecutionContext {
    pub fn new(num: impl Into<String>) -> Self {
        Self {
            num: num.into(),
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn current_action(&self) -> Option<String> {
        self.state.lock().current_action.clone()
    }

    /// Configs committed by non-storable actions, in commit order
    pub fn committed_configs(&self) -> Vec<Value> {
        self.state.lock().committed.clone()
    }

    pub fn finished_actions(&self) -> Vec<String> {
        self.state.lock().finished.clone()
    }

    pub fn cleared_actions(&self) -> Vec<String> {
        self.state.lock().cleared.clone()
    }

    pub fn application_events(&self) -> Vec<Value> {
        self.state.lock().application_events.clone()
    }

    pub fn has_access(&self) -> bool {
        self.state.lock().access_depth > 0
    }
}

impl Default for InMemoryExecutionContext {
    fn default() -> Self {
        Self::new("1")
    }
}

impl ExecutionContext for InMemoryExecutionContext {
    fn num(&self) -> String {
        self.num.clone()
    }

    fn set_current_action(&self, action_id: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.state.lock().current_action, action_id)
    }

    fn set_current_access(&self, _component: Option<&Arc<dyn ComponentHandle>>) {
        self.state.lock().access_depth += 1;
    }

    fn release_current_access(&self) {
        let mut state = self.state.lock();
        state.access_depth = state.access_depth.saturating_sub(1);
    }

    fn join_component_configs(&self, configs: &[Value], action_id: &str) {
        self.state
            .lock()
            .pending
            .entry(action_id.to_string())
            .or_default()
            .extend(configs.iter().cloned());
    }

    fn finish_component_configs(&self, action_id: &str) {
        let mut state = self.state.lock();
        if let Some(configs) = state.pending.remove(action_id) {
            state.committed.extend(configs);
        }
        state.finished.push(action_id.to_string());
    }

    fn clear_component_configs(&self, action_id: &str) {
        let mut state = self.state.lock();
        state.pending.remove(action_id);
        state.cleared.push(action_id.to_string());
    }

    fn fire_application_event(&self, event: &Value) {
        self.state.lock().application_events.push(event.clone());
    }
}
