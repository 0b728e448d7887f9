use crate::agent_engine::history::CycleHistory;
use crate::agent_engine::state::{CycleOutcome, CycleRecord};
use crate::capability::Capability;
use crate::config::AppConfig;
use crate::errors::DeskPilotResult;
use crate::executor::gate::GateState;
use crate::executor::input::{DeviceControl, EnigoDevice};
use crate::executor::selection::SelectionStrategy;
use crate::executor::signals::open_confirmation_source;
use crate::executor::{parser, ActionExecutor, ConfirmationGate};
use crate::llm::{ActionAdvisor, OpenAiCompatibleAdvisor};
use crate::perception::pipeline::ScreenAnalyzer;
use crate::perception::screenshot::ScreenSource;

/// Drives one analysis-to-action cycle at a time:
/// capture → analyse → advise → parse → select → confirm → execute → persist.
///
/// The core is synchronous; the advisor call is the only async step and runs
/// on a private current-thread runtime.
pub struct CycleRunner {
    analyzer: ScreenAnalyzer,
    advisor: Capability<Box<dyn ActionAdvisor>>,
    selection: SelectionStrategy,
    gate: ConfirmationGate,
    executor: ActionExecutor,
    history: Option<CycleHistory>,
    runtime: tokio::runtime::Runtime,
}

impl CycleRunner {
    pub fn new(
        analyzer: ScreenAnalyzer,
        advisor: Capability<Box<dyn ActionAdvisor>>,
        selection: SelectionStrategy,
        gate: ConfirmationGate,
        executor: ActionExecutor,
        history: Option<CycleHistory>,
    ) -> DeskPilotResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            analyzer,
            advisor,
            selection,
            gate,
            executor,
            history,
            runtime,
        })
    }

    /// Wire up the real backends. Anything that fails to open is carried as
    /// an unavailable capability rather than failing startup.
    pub fn from_config(cfg: &AppConfig, auto_execute: bool) -> DeskPilotResult<Self> {
        let analyzer = ScreenAnalyzer::from_config(&cfg.analysis);

        let advisor: Capability<Box<dyn ActionAdvisor>> =
            OpenAiCompatibleAdvisor::from_config(&cfg.llm)
                .map(|a| Box::new(a) as Box<dyn ActionAdvisor>)
                .into();
        if let Some(reason) = advisor.unavailable_reason() {
            tracing::warn!(reason, "advisor unavailable, cycles will end without a response");
        }

        let device: Capability<Box<dyn DeviceControl>> = EnigoDevice::new()
            .map(|d| Box::new(d) as Box<dyn DeviceControl>)
            .into();
        let executor = ActionExecutor::new(device, &cfg.execution);

        let auto = auto_execute || cfg.execution.auto_execute;
        let gate = ConfirmationGate::new(open_confirmation_source(cfg), &cfg.confirmation, auto);

        let history = if cfg.storage.enabled {
            match CycleHistory::open(&cfg.storage) {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::warn!(error = %e, "history unavailable, cycles will not be persisted");
                    None
                }
            }
        } else {
            None
        };

        Self::new(
            analyzer,
            advisor,
            cfg.execution.selection,
            gate,
            executor,
            history,
        )
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Run one full cycle. Every stage failure is folded into the returned
    /// record; the record is persisted before returning.
    pub fn run_cycle(&mut self, source: &dyn ScreenSource) -> CycleRecord {
        let mut record = CycleRecord::new();
        let span = tracing::info_span!("cycle", id = %record.cycle_id);
        let _guard = span.enter();
        tracing::info!(source = %source.describe(), "cycle started");

        self.run_stages(source, &mut record);

        tracing::info!(outcome = %record.outcome, "cycle finished");
        if let Some(history) = &self.history {
            history.append(&record);
        }
        record
    }

    fn run_stages(&mut self, source: &dyn ScreenSource, record: &mut CycleRecord) {
        let shot = match source.capture() {
            Ok(shot) => shot,
            Err(e) => {
                tracing::error!(error = %e, "capture failed");
                record.error = Some(e.to_string());
                record.outcome = CycleOutcome::Aborted {
                    reason: format!("capture failed: {e}"),
                };
                return;
            }
        };

        let report = self.analyzer.analyze(&shot);
        let png = match shot.encode_png() {
            Ok(png) => Some(png),
            Err(e) => {
                tracing::warn!(error = %e, "screenshot not encoded, continuing without it");
                None
            }
        };
        if let Some(history) = &self.history {
            if let Some(png) = &png {
                record.screenshot_path = history.save_screenshot(record, png);
            }
            record.report_path = history.save_report(record, &report);
        }

        let advisor = match &self.advisor {
            Capability::Available(advisor) => advisor,
            Capability::Unavailable { reason } => {
                record.error = Some(format!("advisor unavailable: {reason}"));
                record.outcome = CycleOutcome::NoResponse;
                return;
            }
        };
        let response = match self.runtime.block_on(advisor.propose(&report, png.as_deref())) {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::warn!(advisor = advisor.name(), "advisor returned no content");
                record.outcome = CycleOutcome::NoResponse;
                return;
            }
            Err(e) => {
                tracing::error!(advisor = advisor.name(), error = %e, "advisor call failed");
                record.error = Some(e.to_string());
                record.outcome = CycleOutcome::NoResponse;
                return;
            }
        };
        tracing::debug!(chars = response.len(), "advisor response received");

        let parsed = parser::parse(&response);
        record.response = Some(response);
        if parsed.is_empty() {
            tracing::info!("no actions found in response");
            record.outcome = CycleOutcome::NoDirectives;
            return;
        }

        let center = report.screen_dimensions.center();
        record.directives = self.selection.select(parsed, center);

        match self.gate.decide(&record.directives) {
            GateState::Confirmed => {}
            GateState::Cancelled => {
                record.outcome = CycleOutcome::Cancelled;
                return;
            }
            GateState::Idle | GateState::AwaitingConfirmation => {
                record.outcome = CycleOutcome::NoDirectives;
                return;
            }
        }

        record.outcomes = self.executor.execute(&record.directives, Some(&report));
        record.outcome = CycleOutcome::from_outcomes(&record.outcomes);
    }
}
