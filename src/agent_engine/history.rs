use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent_engine::state::CycleRecord;
use crate::config::StorageConfig;
use crate::errors::DeskPilotResult;
use crate::report::AnalysisReport;

/// Per-cycle persistence: screenshot PNGs, pretty report JSON and an
/// append-only JSONL cycle log. Write failures are logged, never returned.
pub struct CycleHistory {
    screenshots_dir: PathBuf,
    reports_dir: PathBuf,
    log_path: PathBuf,
    save_screenshots: bool,
}

impl CycleHistory {
    pub fn open(cfg: &StorageConfig) -> DeskPilotResult<Self> {
        let base = cfg.base_dir.clone().unwrap_or_else(data_dir_or_cwd);
        Self::open_at(&base, cfg.save_screenshots)
    }

    pub fn open_at(base: &Path, save_screenshots: bool) -> DeskPilotResult<Self> {
        let screenshots_dir = base.join("screenshots");
        let reports_dir = base.join("reports");
        std::fs::create_dir_all(&screenshots_dir)?;
        std::fs::create_dir_all(&reports_dir)?;
        tracing::info!(path = %base.display(), "history directory ready");
        Ok(Self {
            screenshots_dir,
            reports_dir,
            log_path: base.join("cycles.jsonl"),
            save_screenshots,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn save_screenshot(&self, record: &CycleRecord, png: &[u8]) -> Option<PathBuf> {
        if !self.save_screenshots {
            return None;
        }
        let path = self.screenshots_dir.join(format!(
            "screenshot_{}_{}.png",
            record.ts.format("%Y%m%d_%H%M%S"),
            short_id(record)
        ));
        match std::fs::write(&path, png) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "screenshot not saved");
                None
            }
        }
    }

    pub fn save_report(&self, record: &CycleRecord, report: &AnalysisReport) -> Option<PathBuf> {
        let path = self.reports_dir.join(format!(
            "screen_analysis_{}_{}.json",
            record.ts.format("%Y%m%d_%H%M%S"),
            short_id(record)
        ));
        let result = serde_json::to_string_pretty(report)
            .map_err(crate::errors::DeskPilotError::from)
            .and_then(|json| std::fs::write(&path, json).map_err(Into::into));
        match result {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "report not saved");
                None
            }
        }
    }

    /// Append one record to the JSONL log.
    pub fn append(&self, record: &CycleRecord) {
        if let Err(e) = self.try_append(record) {
            tracing::warn!(error = %e, path = %self.log_path.display(), "cycle record not saved");
        }
    }

    fn try_append(&self, record: &CycleRecord) -> DeskPilotResult<()> {
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.log_path.display(), "cycle record flushed");
        Ok(())
    }
}

fn short_id(record: &CycleRecord) -> String {
    record.cycle_id.simple().to_string()[..8].to_string()
}

/// Platform data directory (`~/.local/share/deskpilot`, `%LOCALAPPDATA%\deskpilot`, …),
/// falling back to the current working directory.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("deskpilot"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::CycleOutcome;
    use crate::perception::types::{DetectedElements, Dimensions};
    use crate::report::{compile, ReportInput};

    #[test]
    fn writes_report_screenshot_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::open_at(dir.path(), true).unwrap();
        let mut record = CycleRecord::new();

        let report = compile(ReportInput {
            fragments: Vec::new(),
            elements: DetectedElements::default(),
            image_dimensions: Dimensions::new(10, 10),
            screen_dimensions: None,
            degraded: Vec::new(),
            timestamp: record.ts,
        });
        record.report_path = history.save_report(&record, &report);
        record.screenshot_path = history.save_screenshot(&record, b"png bytes");
        record.outcome = CycleOutcome::NoResponse;
        history.append(&record);
        history.append(&record);

        let report_path = record.report_path.clone().unwrap();
        let name = report_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("screen_analysis_"));
        let saved: AnalysisReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(saved, report);
        assert!(record.screenshot_path.unwrap().exists());

        let log = std::fs::read_to_string(history.log_path()).unwrap();
        assert_eq!(log.lines().count(), 2);
        let first: CycleRecord = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(first.cycle_id, record.cycle_id);
    }

    #[test]
    fn screenshots_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::open_at(dir.path(), false).unwrap();
        assert!(history.save_screenshot(&CycleRecord::new(), b"x").is_none());
    }
}
