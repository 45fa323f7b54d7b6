use super::{Action, ActionDefRegistry, ActionHandle, ActionIdAllocator};
use crate::error::{ActionError, ActionResult};
use std::sync::Arc;
use tracing::debug;

/// Builds actions from registered definitions
#[derive(Debug, Clone)]
pub struct ActionFactory {
    registry: Arc<ActionDefRegistry>,
    ids: Arc<ActionIdAllocator>,
    context_num: String,
}

impl ActionFactory {
    pub fn new(
        registry: Arc<ActionDefRegistry>,
        ids: Arc<ActionIdAllocator>,
        context_num: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            ids,
            context_num: context_num.into(),
        }
    }

    /// A `NEW` action for `descriptor`; unknown descriptors are a configuration error
    pub fn create(&self, descriptor: &str) -> ActionResult<Action> {
        let def = self
            .registry
            .get(descriptor)
            .ok_or_else(|| ActionError::UnknownDescriptor(descriptor.to_string()))?;
        debug!(descriptor = %descriptor, "Creating action");
        Ok(Action::new(def, Arc::clone(&self.ids), self.context_num.clone()))
    }

    pub fn create_handle(&self, descriptor: &str) -> ActionResult<ActionHandle> {
        self.create(descriptor).map(ActionHandle::new)
    }

    pub fn registry(&self) -> &Arc<ActionDefRegistry> {
        &self.registry
    }

    pub fn ids(&self) -> &Arc<ActionIdAllocator> {
        &self.ids
    }

    pub fn context_num(&self) -> &str {
        &self.context_num
    }
}
