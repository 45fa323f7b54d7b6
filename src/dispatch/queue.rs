use crate::action::ActionHandle;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Batch partition of a server action, by its `background` and `exclusive` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    ForegroundExclusive,
    ForegroundConcurrent,
    BackgroundExclusive,
    BackgroundConcurrent,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::ForegroundExclusive,
        Partition::ForegroundConcurrent,
        Partition::BackgroundExclusive,
        Partition::BackgroundConcurrent,
    ];

    pub fn classify(background: bool, exclusive: bool) -> Self {
        match (background, exclusive) {
            (false, true) => Self::ForegroundExclusive,
            (false, false) => Self::ForegroundConcurrent,
            (true, true) => Self::BackgroundExclusive,
            (true, false) => Self::BackgroundConcurrent,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, Self::BackgroundExclusive | Self::BackgroundConcurrent)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::ForegroundExclusive | Self::BackgroundExclusive)
    }

    fn index(self) -> usize {
        match self {
            Self::ForegroundExclusive => 0,
            Self::ForegroundConcurrent => 1,
            Self::BackgroundExclusive => 2,
            Self::BackgroundConcurrent => 3,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForegroundExclusive => write!(f, "foreground_exclusive"),
            Self::ForegroundConcurrent => write!(f, "foreground_concurrent"),
            Self::BackgroundExclusive => write!(f, "background_exclusive"),
            Self::BackgroundConcurrent => write!(f, "background_concurrent"),
        }
    }
}

/// Pending actions of the dispatcher.
///
/// Client actions run locally in their own lane. Server actions wait in one FIFO per
/// partition. Chained actions are held back until the current cycle finishes.
#[derive(Debug, Default)]
pub struct ActionQueue {
    client: VecDeque<ActionHandle>,
    partitions: [VecDeque<ActionHandle>; 4],
    chained: Vec<ActionHandle>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_client(&mut self, handle: ActionHandle) {
        self.client.push_back(handle);
    }

    pub fn push(&mut self, partition: Partition, handle: ActionHandle) {
        self.partitions[partition.index()].push_back(handle);
    }

    pub fn push_chained(&mut self, handle: ActionHandle) {
        self.chained.push(handle);
    }

    pub fn take_client(&mut self) -> Vec<ActionHandle> {
        self.client.drain(..).collect()
    }

    /// Everything waiting in `partition`, oldest first
    pub fn take_partition(&mut self, partition: Partition) -> Vec<ActionHandle> {
        self.partitions[partition.index()].drain(..).collect()
    }

    pub fn take_chained(&mut self) -> Vec<ActionHandle> {
        std::mem::take(&mut self.chained)
    }

    pub fn pending_in(&self, partition: Partition) -> usize {
        self.partitions[partition.index()].len()
    }

    /// Client and server actions ready for the next cycle
    pub fn ready_len(&self) -> usize {
        self.client.len() + self.partitions.iter().map(VecDeque::len).sum::<usize>()
    }

    pub fn chained_len(&self) -> usize {
        self.chained.len()
    }

    pub fn has_pending(&self) -> bool {
        self.ready_len() > 0 || !self.chained.is_empty()
    }
}
