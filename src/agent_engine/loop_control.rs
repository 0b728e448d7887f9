use crate::agent_engine::state::CycleOutcome;
use crate::config::SessionConfig;

/// Session limits for the interactive loop: a cycle budget and a cap on
/// consecutive aborted cycles.
pub struct LoopController {
    max_cycles: Option<u32>,
    max_consecutive_failures: Option<u32>,
    cycles: u32,
    consecutive_failures: u32,
}

impl LoopController {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            max_cycles: config.max_cycles,
            max_consecutive_failures: config.max_consecutive_failures,
            cycles: 0,
            consecutive_failures: 0,
        }
    }

    pub fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        if outcome.is_aborted() {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Why the session should end, if it should.
    pub fn stop_reason(&self) -> Option<String> {
        if let Some(max) = self.max_cycles {
            if self.cycles >= max {
                return Some(format!("reached {max} cycles"));
            }
        }
        if let Some(max) = self.max_consecutive_failures {
            if self.consecutive_failures >= max {
                return Some(format!("{max} consecutive cycles aborted"));
            }
        }
        None
    }

    pub fn should_stop(&self) -> bool {
        self.stop_reason().is_some()
    }
}
