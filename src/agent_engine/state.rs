use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::executor::directive::{ActionDirective, ExecutionOutcome};

/// How a cycle ended. Every cycle ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    FullyExecuted {
        executed: usize,
    },
    PartiallyExecuted {
        executed: usize,
        skipped: usize,
        failed: usize,
    },
    NoDirectives,
    NoResponse,
    Cancelled,
    Aborted {
        reason: String,
    },
}

impl CycleOutcome {
    pub fn from_outcomes(outcomes: &[ExecutionOutcome]) -> Self {
        let executed = outcomes.iter().filter(|o| o.is_executed()).count();
        let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
        let failed = outcomes.len() - executed - skipped;
        if outcomes.is_empty() {
            CycleOutcome::NoDirectives
        } else if executed == outcomes.len() {
            CycleOutcome::FullyExecuted { executed }
        } else {
            CycleOutcome::PartiallyExecuted {
                executed,
                skipped,
                failed,
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CycleOutcome::Aborted { .. })
    }
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::FullyExecuted { executed } => {
                write!(f, "fully executed ({executed} directives)")
            }
            CycleOutcome::PartiallyExecuted {
                executed,
                skipped,
                failed,
            } => write!(
                f,
                "partially executed ({executed} executed, {skipped} skipped, {failed} failed)"
            ),
            CycleOutcome::NoDirectives => write!(f, "no actions found"),
            CycleOutcome::NoResponse => write!(f, "no response from advisor"),
            CycleOutcome::Cancelled => write!(f, "cancelled by user"),
            CycleOutcome::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// One JSONL line in the cycle log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_id: uuid::Uuid,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub screenshot_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub response: Option<String>,
    pub directives: Vec<ActionDirective>,
    pub outcomes: Vec<ExecutionOutcome>,
    pub outcome: CycleOutcome,
    pub error: Option<String>,
}

impl CycleRecord {
    pub fn new() -> Self {
        Self {
            cycle_id: uuid::Uuid::new_v4(),
            ts: chrono::Utc::now(),
            screenshot_path: None,
            report_path: None,
            response: None,
            directives: Vec::new(),
            outcomes: Vec::new(),
            outcome: CycleOutcome::NoDirectives,
            error: None,
        }
    }
}

impl Default for CycleRecord {
    fn default() -> Self {
        Self::new()
    }
}
