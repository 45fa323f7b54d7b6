use crate::action::{Action, ActionHandle};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Identifier of a cancellation group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbortGroupId(u64);

impl AbortGroupId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AbortGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks which enqueued actions belong to which abort group
#[derive(Debug)]
pub struct AbortGroupCoordinator {
    current: AtomicU64,
    groups: DashMap<AbortGroupId, Vec<ActionHandle>>,
}

impl AbortGroupCoordinator {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(1),
            groups: DashMap::new(),
        }
    }

    /// Group that newly enqueued abortable actions join
    pub fn current_group(&self) -> AbortGroupId {
        AbortGroupId(self.current.load(Ordering::SeqCst))
    }

    /// Advance to a fresh group and return it
    pub fn begin_transaction(&self) -> AbortGroupId {
        let id = AbortGroupId(self.current.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(abortable_id = %id, "Beginning abortable transaction");
        id
    }

    /// Register an action being enqueued. Abortable actions without a group get the current
    /// one, and children keep the group inherited from their parent. Returns the group the
    /// action joined.
    ///
    /// `action` is the locked content of `handle`.
    pub fn assign(&self, handle: &ActionHandle, action: &mut Action) -> Option<AbortGroupId> {
        let id = match action.get_abortable_id() {
            Some(id) => id,
            None if action.is_abortable() => {
                let id = self.current_group();
                action.set_abortable_id(id);
                id
            }
            None => return None,
        };
        self.groups.entry(id).or_default().push(handle.clone());
        debug!(action_id = %handle.id(), abortable_id = %id, "Action joined abort group");
        Some(id)
    }

    /// Whether aborting `group` should abort `action`
    pub fn should_abort(&self, group: AbortGroupId, action: &Action) -> bool {
        action.get_abortable_id() == Some(group)
            && !action.is_delivered()
            && action.get_state().is_abortable_from()
    }

    /// Drop a finished member
    pub fn release(&self, group: AbortGroupId, action_id: &str) {
        let now_empty = match self.groups.get_mut(&group) {
            Some(mut members) => {
                members.retain(|member| member.id() != action_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.groups.remove_if(&group, |_, members| members.is_empty());
        }
    }

    /// Remove a group and return its members
    pub fn take_group(&self, group: AbortGroupId) -> Vec<ActionHandle> {
        self.groups
            .remove(&group)
            .map(|(_, members)| members)
            .unwrap_or_default()
    }

    /// Groups older than `id`
    pub fn groups_before(&self, id: AbortGroupId) -> Vec<AbortGroupId> {
        let mut older: Vec<_> = self
            .groups
            .iter()
            .map(|entry| *entry.key())
            .filter(|group| *group < id)
            .collect();
        older.sort();
        older
    }

    pub fn member_count(&self, group: AbortGroupId) -> usize {
        self.groups.get(&group).map_or(0, |members| members.len())
    }

    /// Abort every abortable member of `group`; returns the handles that were aborted
    pub fn abort_group(&self, group: AbortGroupId) -> Vec<ActionHandle> {
        let members = self.take_group(group);
        let aborted: Vec<_> = members
            .into_iter()
            .filter(|handle| {
                let mut action = handle.lock();
                self.should_abort(group, &action) && action.abort()
            })
            .collect();
        if !aborted.is_empty() {
            info!(abortable_id = %group, aborted = aborted.len(), "Aborted action group");
        }
        aborted
    }
}

impl Default for AbortGroupCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
