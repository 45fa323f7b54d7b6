use super::{Action, ActionState};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// Shared handle to an enqueued action.
///
/// The dispatcher, the abort coordinator and the caller all refer to the same action through
/// clones of one handle. Creating a handle fixes the action id. Callbacks run while the
/// action is locked and must not lock their own handle.
#[derive(Clone)]
pub struct ActionHandle {
    id: Arc<str>,
    inner: Arc<Mutex<Action>>,
}

impl ActionHandle {
    pub fn new(action: Action) -> Self {
        let id = Arc::from(action.get_id());
        Self {
            id,
            inner: Arc::new(Mutex::new(action)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, Action> {
        self.inner.lock()
    }

    pub fn state(&self) -> ActionState {
        self.inner.lock().get_state()
    }

    /// Whether both handles refer to the same action
    pub fn ptr_eq(&self, other: &ActionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Action> for ActionHandle {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle").field("id", &self.id).finish()
    }
}
