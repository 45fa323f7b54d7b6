use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic source of action numbers, shared by every action created in one process
/// lifetime. Combined with a context sequence number to form `"{counter};{context}"` ids.
#[derive(Debug)]
pub struct ActionIdAllocator {
    next_action_id: AtomicU64,
}

impl ActionIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next_action_id: AtomicU64::new(first),
        }
    }

    /// Allocate the next action number
    pub fn next_action_id(&self) -> u64 {
        self.next_action_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The number the next allocation will return
    pub fn peek(&self) -> u64 {
        self.next_action_id.load(Ordering::Relaxed)
    }
}

impl Default for ActionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Format an action id from its number and context sequence
pub fn format_action_id(action_id: u64, context_num: &str) -> String {
    format!("{action_id};{context_num}")
}
