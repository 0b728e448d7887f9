use std::time::Duration;

use serde::Serialize;

use crate::capability::Capability;
use crate::config::{ConfirmationConfig, UnavailablePolicy};
use crate::executor::directive::ActionDirective;
use crate::executor::Sleeper;

/// A pollable confirm/cancel signal (hotkeys, a terminal prompt, a UI button).
pub trait ConfirmationSource {
    /// Called once per cycle before polling starts. Clears signals left over
    /// from earlier cycles and announces what is about to run.
    fn arm(&mut self, directives: &[ActionDirective]);

    fn is_confirm_active(&mut self) -> bool;

    fn is_cancel_active(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Idle,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
}

/// Single-step human checkpoint between parsing and execution.
pub struct ConfirmationGate {
    source: Capability<Box<dyn ConfirmationSource>>,
    auto_execute: bool,
    on_unavailable: UnavailablePolicy,
    poll_interval: Duration,
    debounce: Duration,
    timeout: Option<Duration>,
    sleep: Sleeper,
    state: GateState,
}

impl ConfirmationGate {
    pub fn new(
        source: Capability<Box<dyn ConfirmationSource>>,
        cfg: &ConfirmationConfig,
        auto_execute: bool,
    ) -> Self {
        if let Some(reason) = source.unavailable_reason() {
            tracing::warn!(reason, policy = ?cfg.on_unavailable, "confirmation source unavailable");
        }
        Self {
            source,
            auto_execute,
            on_unavailable: cfg.on_unavailable,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            debounce: Duration::from_millis(cfg.debounce_ms),
            timeout: cfg.timeout_ms.map(Duration::from_millis),
            sleep: crate::executor::thread_sleeper(),
            state: GateState::Idle,
        }
    }

    pub fn with_sleeper(mut self, sleep: Sleeper) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Run the gate for one cycle and return the terminal state. Zero
    /// directives leave the gate `Idle`. Cancel is checked before confirm on
    /// every tick, so a simultaneous press cancels.
    pub fn decide(&mut self, directives: &[ActionDirective]) -> GateState {
        self.state = GateState::Idle;
        if directives.is_empty() {
            return self.state;
        }
        if self.auto_execute {
            tracing::info!(count = directives.len(), "auto-execute on, skipping confirmation");
            self.state = GateState::Confirmed;
            return self.state;
        }

        let source = match &mut self.source {
            Capability::Available(source) => source,
            Capability::Unavailable { reason } => {
                self.state = match self.on_unavailable {
                    UnavailablePolicy::Proceed => {
                        tracing::warn!(%reason, "no confirmation source, proceeding without confirmation");
                        GateState::Confirmed
                    }
                    UnavailablePolicy::Cancel => {
                        tracing::warn!(%reason, "no confirmation source, cancelling cycle");
                        GateState::Cancelled
                    }
                };
                return self.state;
            }
        };

        self.state = GateState::AwaitingConfirmation;
        source.arm(directives);
        tracing::info!(count = directives.len(), "awaiting confirmation");

        let mut waited = Duration::ZERO;
        loop {
            if source.is_cancel_active() {
                tracing::info!("cycle cancelled by user");
                self.state = GateState::Cancelled;
                break;
            }
            if source.is_confirm_active() {
                (self.sleep)(self.debounce);
                tracing::info!("actions confirmed");
                self.state = GateState::Confirmed;
                break;
            }
            if let Some(limit) = self.timeout {
                if waited >= limit {
                    tracing::warn!(timeout_ms = limit.as_millis() as u64, "confirmation timed out");
                    self.state = GateState::Cancelled;
                    break;
                }
            }
            (self.sleep)(self.poll_interval);
            waited += self.poll_interval;
        }
        self.state
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted source: each poll tick pops one `(confirm, cancel)` pair;
    /// once the script runs out both signals stay off.
    pub(crate) struct Scripted {
        pub ticks: VecDeque<(bool, bool)>,
        pub current: (bool, bool),
        pub armed: Arc<Mutex<usize>>,
    }

    impl Scripted {
        pub(crate) fn new(ticks: &[(bool, bool)]) -> Self {
            Self {
                ticks: ticks.iter().copied().collect(),
                current: (false, false),
                armed: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl ConfirmationSource for Scripted {
        fn arm(&mut self, _directives: &[ActionDirective]) {
            *self.armed.lock().unwrap() += 1;
        }

        // cancel is always polled first, so advance the script there
        fn is_cancel_active(&mut self) -> bool {
            self.current = self.ticks.pop_front().unwrap_or((false, false));
            self.current.1
        }

        fn is_confirm_active(&mut self) -> bool {
            self.current.0
        }
    }

    fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (Box::new(move |d| sink.lock().unwrap().push(d)), log)
    }

    fn gate(
        source: Capability<Box<dyn ConfirmationSource>>,
        cfg: &ConfirmationConfig,
        auto: bool,
    ) -> (ConfirmationGate, Arc<Mutex<Vec<Duration>>>) {
        let (sleep, log) = recording_sleeper();
        (ConfirmationGate::new(source, cfg, auto).with_sleeper(sleep), log)
    }

    fn one() -> Vec<ActionDirective> {
        vec![ActionDirective::Click { x: 1, y: 1 }]
    }

    #[test]
    fn no_directives_stays_idle() {
        let src: Box<dyn ConfirmationSource> = Box::new(Scripted::new(&[(true, false)]));
        let (mut g, _) = gate(Capability::Available(src), &ConfirmationConfig::default(), false);
        assert_eq!(g.decide(&[]), GateState::Idle);
    }

    #[test]
    fn auto_execute_confirms_without_polling() {
        let (mut g, log) = gate(Capability::unavailable("none"), &ConfirmationConfig::default(), true);
        assert_eq!(g.decide(&one()), GateState::Confirmed);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn confirm_after_polling_applies_debounce() {
        let src = Scripted::new(&[(false, false), (false, false), (true, false)]);
        let armed = src.armed.clone();
        let (mut g, log) = gate(
            Capability::Available(Box::new(src)),
            &ConfirmationConfig::default(),
            false,
        );
        assert_eq!(g.decide(&one()), GateState::Confirmed);
        assert_eq!(*armed.lock().unwrap(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                Duration::from_millis(50),
                Duration::from_millis(50),
                Duration::from_millis(200)
            ]
        );
    }

    #[test]
    fn cancel_wins_over_simultaneous_confirm() {
        let src = Scripted::new(&[(true, true)]);
        let (mut g, _) = gate(
            Capability::Available(Box::new(src)),
            &ConfirmationConfig::default(),
            false,
        );
        assert_eq!(g.decide(&one()), GateState::Cancelled);
    }

    #[test]
    fn timeout_cancels() {
        let cfg = ConfirmationConfig {
            timeout_ms: Some(120),
            ..ConfirmationConfig::default()
        };
        let (mut g, log) = gate(Capability::Available(Box::new(Scripted::new(&[]))), &cfg, false);
        assert_eq!(g.decide(&one()), GateState::Cancelled);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn unavailable_source_follows_policy() {
        let (mut g, _) = gate(
            Capability::unavailable("no display"),
            &ConfirmationConfig::default(),
            false,
        );
        assert_eq!(g.decide(&one()), GateState::Cancelled);

        let cfg = ConfirmationConfig {
            on_unavailable: UnavailablePolicy::Proceed,
            ..ConfirmationConfig::default()
        };
        let (mut g, _) = gate(Capability::unavailable("no display"), &cfg, false);
        assert_eq!(g.decide(&one()), GateState::Confirmed);
    }

    #[test]
    fn each_cycle_starts_idle() {
        let src = Scripted::new(&[(false, true), (true, false)]);
        let (mut g, _) = gate(
            Capability::Available(Box::new(src)),
            &ConfirmationConfig::default(),
            false,
        );
        assert_eq!(g.decide(&one()), GateState::Cancelled);
        assert_eq!(g.decide(&one()), GateState::Confirmed);
    }
}
