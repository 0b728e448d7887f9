use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DeskPilotResult;

/// One parsed action instruction. Nothing about it is validated until the
/// executor checks it against screen bounds or the key table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionDirective {
    Click { x: i32, y: i32 },
    Type { text: String },
    Press { key: String },
}

impl fmt::Display for ActionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionDirective::Click { x, y } => write!(f, "CLICK ({x}, {y})"),
            ActionDirective::Type { text } => write!(f, "TYPE \"{text}\""),
            ActionDirective::Press { key } => write!(f, "PRESS \"{key}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Executed,
    SkippedOutOfBounds,
    SkippedUnknownKey,
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, ExecutionOutcome::Executed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::SkippedOutOfBounds | ExecutionOutcome::SkippedUnknownKey
        )
    }
}

impl From<DeskPilotResult<()>> for ExecutionOutcome {
    fn from(result: DeskPilotResult<()>) -> Self {
        match result {
            Ok(()) => ExecutionOutcome::Executed,
            Err(e) => ExecutionOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}
