use super::states::TerminalState;
use super::Action;
use crate::component::{same_scope, CallbackScope};
use std::fmt;
use std::sync::Arc;

/// Callback invoked with its bound scope and the finished action
pub type CallbackFn = Arc<dyn Fn(&CallbackScope, &Action) + Send + Sync>;

/// Wrap a closure as a [`CallbackFn`]
pub fn callback_fn<F>(f: F) -> CallbackFn
where
    F: Fn(&CallbackScope, &Action) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A registered `(scope, function)` pair
#[derive(Clone)]
pub struct ActionCallback {
    scope: CallbackScope,
    func: CallbackFn,
}

impl ActionCallback {
    pub fn new(scope: CallbackScope, func: CallbackFn) -> Self {
        Self { scope, func }
    }

    pub fn scope(&self) -> &CallbackScope {
        &self.scope
    }

    pub fn func(&self) -> &CallbackFn {
        &self.func
    }

    pub fn invoke(&self, action: &Action) {
        (self.func)(&self.scope, action)
    }

    /// Same scope and same function instance
    pub fn same_as(&self, other: &ActionCallback) -> bool {
        same_scope(&self.scope, &other.scope)
            && std::ptr::eq(
                Arc::as_ptr(&self.func) as *const (),
                Arc::as_ptr(&other.func) as *const (),
            )
    }
}

impl fmt::Debug for ActionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCallback")
            .field("scoped", &self.scope.is_some())
            .finish_non_exhaustive()
    }
}

/// One slot per terminal state
#[derive(Debug, Clone, Default)]
pub struct CallbackTable {
    slots: [Option<ActionCallback>; 4],
}

impl CallbackTable {
    pub fn get(&self, state: TerminalState) -> Option<&ActionCallback> {
        self.slots[state.index()].as_ref()
    }

    /// Overwrite a single slot
    pub fn set(&mut self, state: TerminalState, callback: ActionCallback) {
        self.slots[state.index()] = Some(callback);
    }

    /// Populate all four slots with the same pair
    pub fn set_all(&mut self, callback: ActionCallback) {
        for state in TerminalState::ALL {
            self.set(state, callback.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn registered(&self) -> impl Iterator<Item = TerminalState> + '_ {
        TerminalState::ALL
            .into_iter()
            .filter(|state| self.get(*state).is_some())
    }
}
