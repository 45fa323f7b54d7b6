//! # Action Storage
//!
//! Cached results of storable actions. An entry is written only when a storable action
//! finishes with `SUCCESS`, and is read before dispatch unless the action was configured to
//! ignore existing entries. Entries are keyed by [`key_encoder::storage_key`].

pub mod action_store;
pub mod key_encoder;

pub use action_store::{ActionStore, InMemoryActionStore};
pub use key_encoder::{encode_params, ordered_encode, storage_key};

use crate::action::ActionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Action store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Failed to serialize stored action: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage {0} is unavailable")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage metadata of a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMeta {
    pub created: DateTime<Utc>,
}

impl StorageMeta {
    pub fn now() -> Self {
        Self {
            created: Utc::now(),
        }
    }
}

/// Cache entry: `{state, returnValue, components, storage: {created}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAction {
    pub state: ActionState,
    #[serde(default)]
    pub return_value: Option<Value>,
    #[serde(default)]
    pub components: Vec<Value>,
    pub storage: StorageMeta,
}
