use std::time::Duration;

use crate::capability::Capability;
use crate::config::ExecutionConfig;
use crate::executor::directive::{ActionDirective, ExecutionOutcome};
use crate::executor::input::DeviceControl;
use crate::executor::keys::KeyCombo;
use crate::executor::safety;
use crate::executor::Sleeper;
use crate::perception::types::Dimensions;
use crate::report::AnalysisReport;

/// Replays confirmed directives against the device. Best effort: a failing
/// directive is recorded and the rest still run.
pub struct ActionExecutor {
    device: Capability<Box<dyn DeviceControl>>,
    action_delay: Duration,
    keystroke_interval: Duration,
    sleep: Sleeper,
}

impl ActionExecutor {
    pub fn new(device: Capability<Box<dyn DeviceControl>>, cfg: &ExecutionConfig) -> Self {
        if let Some(reason) = device.unavailable_reason() {
            tracing::warn!(reason, "device control unavailable, directives will fail");
        }
        Self {
            device,
            action_delay: cfg.action_delay(),
            keystroke_interval: cfg.keystroke_interval(),
            sleep: crate::executor::thread_sleeper(),
        }
    }

    pub fn with_sleeper(mut self, sleep: Sleeper) -> Self {
        self.sleep = sleep;
        self
    }

    /// One outcome per directive, in order. Bounds and key checks run before
    /// the device is touched, so skips do not depend on device availability.
    pub fn execute(
        &mut self,
        directives: &[ActionDirective],
        report: Option<&AnalysisReport>,
    ) -> Vec<ExecutionOutcome> {
        let bounds = match &self.device {
            Capability::Available(device) => safety::resolve_bounds(report, Some(&**device)),
            Capability::Unavailable { .. } => safety::resolve_bounds(report, None),
        };
        tracing::info!(count = directives.len(), ?bounds, "executing directives");

        let mut outcomes = Vec::with_capacity(directives.len());
        for (idx, directive) in directives.iter().enumerate() {
            let outcome = match self.validate(directive, bounds) {
                Err(skipped) => skipped,
                Ok(step) => match &mut self.device {
                    Capability::Available(device) => match step {
                        Step::Click(x, y) => device.move_and_click(x, y).into(),
                        Step::Type(text) => device.type_text(text, self.keystroke_interval).into(),
                        Step::Press(combo) => device.press_key(&combo).into(),
                    },
                    Capability::Unavailable { reason } => ExecutionOutcome::Failed {
                        reason: format!("device unavailable: {reason}"),
                    },
                },
            };

            match &outcome {
                ExecutionOutcome::Executed => {
                    tracing::info!(step = idx + 1, %directive, "directive executed");
                    (self.sleep)(self.action_delay);
                }
                ExecutionOutcome::Failed { reason } => {
                    tracing::error!(step = idx + 1, %directive, reason = %reason, "directive failed");
                }
                _ => {}
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn validate<'a>(
        &self,
        directive: &'a ActionDirective,
        bounds: Option<Dimensions>,
    ) -> Result<Step<'a>, ExecutionOutcome> {
        match directive {
            ActionDirective::Click { x, y } => {
                if safety::click_allowed(*x, *y, bounds) {
                    Ok(Step::Click(*x, *y))
                } else {
                    tracing::warn!(x, y, "click outside screen bounds, skipped");
                    Err(ExecutionOutcome::SkippedOutOfBounds)
                }
            }
            ActionDirective::Type { text } => Ok(Step::Type(text)),
            ActionDirective::Press { key } => key.parse::<KeyCombo>().map(Step::Press).map_err(|e| {
                tracing::warn!(key = %key, error = %e, "unsupported key, skipped");
                ExecutionOutcome::SkippedUnknownKey
            }),
        }
    }
}

/// A directive that passed validation and is ready for the device.
enum Step<'a> {
    Click(i32, i32),
    Type(&'a str),
    Press(KeyCombo),
}
