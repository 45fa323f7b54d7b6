//! Transport seam: sends a batch of server actions and returns one response per action id.

use super::queue::Partition;
use crate::action::{ActionParams, TerminalState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire form of an action: `{id, descriptor, params}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub descriptor: String,
    pub params: ActionParams,
}

/// Per-action response: `{state, returnValue, error?, components?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub id: String,
    pub state: TerminalState,
    #[serde(default)]
    pub return_value: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub components: Vec<Value>,
    #[serde(default)]
    pub events: Vec<Value>,
}

impl ActionResponse {
    pub fn success(id: impl Into<String>, return_value: Value) -> Self {
        Self {
            id: id.into(),
            state: TerminalState::Success,
            return_value: Some(return_value),
            error: None,
            components: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn error(id: impl Into<String>, error: Value) -> Self {
        Self {
            id: id.into(),
            state: TerminalState::Error,
            return_value: None,
            error: Some(error),
            components: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn incomplete(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: TerminalState::Incomplete,
            return_value: None,
            error: None,
            components: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_components(mut self, components: Vec<Value>) -> Self {
        self.components = components;
        self
    }

    pub fn with_events(mut self, events: Vec<Value>) -> Self {
        self.events = events;
        self
    }
}

/// A batch handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportBatch {
    pub partition: Partition,
    pub actions: Vec<ActionRequest>,
}

impl TransportBatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|request| request.id.as_str())
    }
}

/// Transport failures; connectivity loss resolves a batch to `INCOMPLETE`, anything else to `ERROR`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    Connectivity(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

/// Collaborator that physically sends batches
#[async_trait]
pub trait ActionTransport: Send + Sync {
    async fn send(&self, batch: TransportBatch) -> Result<Vec<ActionResponse>, TransportError>;
}
