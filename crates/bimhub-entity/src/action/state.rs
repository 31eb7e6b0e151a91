//! Action lifecycle states and the polling snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a long-running action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionState {
    /// Submitted, not yet executing.
    NotStarted,
    /// Executing.
    Started,
    /// Completed; cancelled actions also end here.
    Finished,
    /// Stopped by an execution error.
    Failed,
}

impl ActionState {
    /// Check if the action is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Return the state as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consistent snapshot of an action, returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongActionState {
    /// Lifecycle state.
    pub state: ActionState,
    /// Percent complete, 0 to 100.
    pub progress: u8,
    /// Human-readable action label.
    pub title: String,
    /// Whether the action stopped because of a cancellation request.
    pub cancelled: bool,
    /// Errors recorded while executing.
    #[serde(default)]
    pub errors: Vec<String>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl LongActionState {
    /// A snapshot of an action that has not started.
    pub fn not_started(title: impl Into<String>) -> Self {
        Self {
            state: ActionState::NotStarted,
            progress: 0,
            title: title.into(),
            cancelled: false,
            errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the action finished without errors or cancellation.
    pub fn is_success(&self) -> bool {
        self.state == ActionState::Finished && !self.cancelled && self.errors.is_empty()
    }
}
