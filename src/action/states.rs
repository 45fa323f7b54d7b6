use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionState {
    /// Constructed and configurable, not yet dispatched
    #[default]
    New,
    /// Handed to the transport or executing locally
    Running,
    Success,
    Error,
    /// Neither succeeded nor definitively failed (e.g. connectivity loss)
    Incomplete,
    Aborted,
}

impl ActionState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }

    /// Check if `abort()` may still move the action to `ABORTED`
    pub fn is_abortable_from(&self) -> bool {
        matches!(self, Self::New | Self::Running)
    }

    /// The callback slot owned by this state, if it is terminal
    pub fn terminal(&self) -> Option<TerminalState> {
        match self {
            Self::Success => Some(TerminalState::Success),
            Self::Error => Some(TerminalState::Error),
            Self::Incomplete => Some(TerminalState::Incomplete),
            Self::Aborted => Some(TerminalState::Aborted),
            Self::New | Self::Running => None,
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Running => write!(f, "RUNNING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
            Self::Incomplete => write!(f, "INCOMPLETE"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

impl std::str::FromStr for ActionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "RUNNING" => Ok(Self::Running),
            other => other
                .parse::<TerminalState>()
                .map(Self::from)
                .map_err(|_| format!("Invalid action state: {s}")),
        }
    }
}

/// Terminal outcomes: the four callback slots and the states a response may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Success,
    Error,
    Incomplete,
    Aborted,
}

impl TerminalState {
    pub const ALL: [TerminalState; 4] = [
        TerminalState::Success,
        TerminalState::Error,
        TerminalState::Incomplete,
        TerminalState::Aborted,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Incomplete => 2,
            Self::Aborted => 3,
        }
    }
}

impl From<TerminalState> for ActionState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Success => ActionState::Success,
            TerminalState::Error => ActionState::Error,
            TerminalState::Incomplete => ActionState::Incomplete,
            TerminalState::Aborted => ActionState::Aborted,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ActionState::from(*self).fmt(f)
    }
}

impl std::str::FromStr for TerminalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            "INCOMPLETE" => Ok(Self::Incomplete),
            "ABORTED" => Ok(Self::Aborted),
            _ => Err(format!("Invalid terminal state: {s}")),
        }
    }
}

/// Target of a callback registration: one slot, or all four
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackTarget {
    All,
    State(TerminalState),
}

impl CallbackTarget {
    /// Resolve an optional registration name; `None` and `"ALL"` both mean every slot
    pub fn resolve(name: Option<&str>) -> Result<Self, ActionError> {
        match name {
            None | Some("ALL") => Ok(Self::All),
            Some(name) => name
                .parse::<TerminalState>()
                .map(Self::State)
                .map_err(|_| ActionError::InvalidCallbackName(name.to_string())),
        }
    }
}
