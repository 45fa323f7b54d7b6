//! Error types for the action dispatch core.
//!
//! Configuration errors ([`ActionError`]) are programmer errors raised synchronously at call
//! time. Execution failures never surface here: they become `ERROR`/`INCOMPLETE` terminal
//! states delivered through the action's callbacks.

use crate::action::ActionState;
use crate::storage::StoreError;
use crate::dispatch::TransportError;
use thiserror::Error;

/// Configuration errors raised by action operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("set_callback(): Invalid callback name '{0}'")]
    InvalidCallbackName(String),

    #[error("set_callback(): callback for '{0}' must be a function")]
    InvalidCallback(String),

    #[error("set_parent_action(): The provided parent action must be a valid abortable Action: {0}")]
    InvalidParentAction(String),

    #[error("set_parent_action(): The provided parent action must be enqueued: {0}")]
    ParentNotEnqueued(String),

    #[error(
        "set_parent_action(): The abortable group is already set, call set_parent_action before enqueueing : {0}"
    )]
    AbortableGroupAlreadySet(String),

    #[error("set_storable() cannot be called on a client action: {0}")]
    StorableRequiresServerAction(String),

    #[error("run_local() cannot be called on a server action: {0}")]
    NotClientAction(String),

    #[error("wrap_callback(): action {id} has no callback slot for state {state}")]
    NoCallbackSlot { id: String, state: ActionState },

    #[error("Action {id} cannot be enqueued in state {state}")]
    NotEnqueueable { id: String, state: ActionState },

    #[error("Unknown action descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("set_id(): action already has id {current}, cannot assign {requested}")]
    IdAlreadyAssigned { current: String, requested: String },
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnvironmentValue { var: String, reason: String },

    #[error("Invalid configuration field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        ConfigurationError::Load(error.to_string())
    }
}

/// Crate-level error
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Event error: {0}")]
    Event(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
