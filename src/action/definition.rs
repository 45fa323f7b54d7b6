//! Action definitions: what an action invokes and which parameters it accepts.

use super::Action;
use crate::diagnostics::ActionFailure;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque identifier of the operation an action performs, e.g. `java://Controller.getItems`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionDescriptor(String);

impl ActionDescriptor {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    /// Full descriptor string, including any `scheme://` prefix
    pub fn qualified_name(&self) -> &str {
        &self.0
    }

    /// Operation name: the segment after the last `.`
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionDescriptor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where an action executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Sent through the transport; the only kind that may be storable
    Server,
    /// Executed locally by its method
    Client,
}

/// Declared parameter: name plus declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub type_name: String,
}

/// The parameter names (and declared types) an action accepts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSchema {
    params: BTreeMap<String, ParamDef>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        self.params.insert(
            name.clone(),
            ParamDef {
                name,
                type_name: type_name.into(),
            },
        );
        self
    }

    /// Schema of untyped parameters
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::new(), |schema, name| schema.with_param(name, "Object"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ParamDef> {
        self.params.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Local implementation of a client action
pub type LocalMethod = Arc<dyn Fn(&Action) -> Result<Value, ActionFailure> + Send + Sync>;

/// Wrap a closure as a [`LocalMethod`]
pub fn local_method<F>(f: F) -> LocalMethod
where
    F: Fn(&Action) -> Result<Value, ActionFailure> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Definition an action is constructed from
#[derive(Clone)]
pub struct ActionDef {
    descriptor: ActionDescriptor,
    kind: ActionKind,
    params: ParamSchema,
    method: Option<LocalMethod>,
}

impl ActionDef {
    pub fn server(descriptor: impl Into<ActionDescriptor>, params: ParamSchema) -> Self {
        Self {
            descriptor: descriptor.into(),
            kind: ActionKind::Server,
            params,
            method: None,
        }
    }

    /// A client action; `method` may be absent, in which case running it fails
    pub fn client(
        descriptor: impl Into<ActionDescriptor>,
        params: ParamSchema,
        method: Option<LocalMethod>,
    ) -> Self {
        Self {
            descriptor: descriptor.into(),
            kind: ActionKind::Client,
            params,
            method,
        }
    }

    pub fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn is_server_action(&self) -> bool {
        self.kind == ActionKind::Server
    }

    pub fn is_client_action(&self) -> bool {
        self.kind == ActionKind::Client
    }

    pub fn params(&self) -> &ParamSchema {
        &self.params
    }

    pub fn method(&self) -> Option<&LocalMethod> {
        self.method.as_ref()
    }
}

impl fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field("descriptor", &self.descriptor)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("has_method", &self.method.is_some())
            .finish()
    }
}

/// Thread-safe registry of action definitions keyed by descriptor
#[derive(Debug, Default)]
pub struct ActionDefRegistry {
    defs: DashMap<String, Arc<ActionDef>>,
}

impl ActionDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, returning the one it replaced
    pub fn register(&self, def: ActionDef) -> Option<Arc<ActionDef>> {
        let key = def.descriptor().to_string();
        debug!(descriptor = %key, kind = ?def.kind(), params = def.params().len(), "Registering action definition");
        self.defs.insert(key, Arc::new(def))
    }

    pub fn get(&self, descriptor: &str) -> Option<Arc<ActionDef>> {
        self.defs.get(descriptor).map(|entry| Arc::clone(entry.value()))
    }

    /// Parameter schema lookup consumed by `set_params`
    pub fn schema(&self, descriptor: &str) -> Option<ParamSchema> {
        self.defs.get(descriptor).map(|entry| entry.params().clone())
    }

    pub fn contains(&self, descriptor: &str) -> bool {
        self.defs.contains_key(descriptor)
    }

    /// A registered descriptor matching `predicate`
    pub fn find_descriptor(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        self.defs
            .iter()
            .map(|entry| entry.key().clone())
            .find(|descriptor| predicate(descriptor.as_str()))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
