use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::selection::SelectionStrategy;

/// Top-level configuration. Built once at startup and handed by reference
/// to every component constructor; nothing downstream reads the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Fragments are kept only when `confidence > ocr_confidence_threshold`.
    #[serde(default = "default_ocr_threshold")]
    pub ocr_confidence_threshold: u8,
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,
    #[serde(default = "default_tesseract_lang")]
    pub tesseract_lang: String,
    #[serde(default = "default_tesseract_oem")]
    pub tesseract_oem: u8,
    #[serde(default = "default_tesseract_psm")]
    pub tesseract_psm: u8,
    #[serde(default = "default_true")]
    pub detect_elements: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ocr_confidence_threshold: default_ocr_threshold(),
            tesseract_cmd: default_tesseract_cmd(),
            tesseract_lang: default_tesseract_lang(),
            tesseract_oem: default_tesseract_oem(),
            tesseract_psm: default_tesseract_psm(),
            detect_elements: true,
        }
    }
}

fn default_ocr_threshold() -> u8 {
    30
}

fn default_tesseract_cmd() -> String {
    "tesseract".into()
}

fn default_tesseract_lang() -> String {
    "eng".into()
}

fn default_tesseract_oem() -> u8 {
    3
}

fn default_tesseract_psm() -> u8 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub auto_execute: bool,
    /// Pause after every executed directive.
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
    /// Pause between individual keystrokes of a TYPE directive.
    #[serde(default = "default_keystroke_interval_ms")]
    pub keystroke_interval_ms: u64,
    #[serde(default)]
    pub selection: SelectionStrategy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            auto_execute: false,
            action_delay_ms: default_action_delay_ms(),
            keystroke_interval_ms: default_keystroke_interval_ms(),
            selection: SelectionStrategy::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn keystroke_interval(&self) -> Duration {
        Duration::from_millis(self.keystroke_interval_ms)
    }
}

fn default_action_delay_ms() -> u64 {
    500
}

fn default_keystroke_interval_ms() -> u64 {
    50
}

/// Where confirm/cancel signals come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalBackend {
    #[default]
    Hotkey,
    Terminal,
    None,
}

/// What the gate does when no signal source could be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Fail open: execute without a human decision.
    Proceed,
    /// Fail closed: treat the cycle as cancelled.
    #[default]
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default)]
    pub backend: SignalBackend,
    #[serde(default)]
    pub on_unavailable: UnavailablePolicy,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// No timeout when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            backend: SignalBackend::default(),
            on_unavailable: UnavailablePolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            timeout_ms: None,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_debounce_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_trigger_key")]
    pub trigger: String,
    #[serde(default = "default_confirm_key")]
    pub confirm: String,
    #[serde(default = "default_cancel_key")]
    pub cancel: String,
    #[serde(default = "default_exit_key")]
    pub exit: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger: default_trigger_key(),
            confirm: default_confirm_key(),
            cancel: default_cancel_key(),
            exit: default_exit_key(),
        }
    }
}

fn default_trigger_key() -> String {
    "f9".into()
}

fn default_confirm_key() -> String {
    "f10".into()
}

fn default_cancel_key() -> String {
    "esc".into()
}

fn default_exit_key() -> String {
    "f12".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Falls back to `DESKPILOT_API_KEY` / `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub stream: bool,
    /// Attach the raw screenshot as an image part.
    #[serde(default = "default_true")]
    pub include_screenshot: bool,
    /// What the model is asked to accomplish on the analysed screen.
    #[serde(default = "default_goal")]
    pub goal: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            stream: false,
            include_screenshot: true,
            goal: default_goal(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_goal() -> String {
    "Suggest the next practical actions on this screen.".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to the platform data directory when absent.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub save_screenshots: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: None,
            save_screenshots: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub max_cycles: Option<u32>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> DeskPilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(DeskPilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

/// Load configuration from `explicit` or the usual search locations, then
/// apply environment overrides.
pub fn load_config(explicit: Option<&Path>) -> DeskPilotResult<AppConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let mut config: AppConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    tracing::info!(
        path = %path.display(),
        model = %config.llm.model,
        auto_execute = config.execution.auto_execute,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> DeskPilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// Overlay environment values onto a parsed config. `lookup` abstracts the
/// environment so tests don't have to mutate process state.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("DESKPILOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
        if !key.trim().is_empty() {
            config.llm.api_key = Some(key.trim().to_string());
        }
    }
    if let Some(flag) = lookup("DESKPILOT_AUTO_EXECUTE") {
        config.execution.auto_execute =
            matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(raw) = lookup("DESKPILOT_OCR_THRESHOLD") {
        match raw.trim().parse::<u8>() {
            Ok(v) if v <= 100 => config.analysis.ocr_confidence_threshold = v,
            _ => tracing::warn!(value = %raw, "ignoring invalid DESKPILOT_OCR_THRESHOLD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.analysis.ocr_confidence_threshold, 30);
        assert!(!cfg.execution.auto_execute);
        assert_eq!(cfg.execution.action_delay(), Duration::from_millis(500));
        assert_eq!(cfg.confirmation.on_unavailable, UnavailablePolicy::Cancel);
        assert_eq!(cfg.hotkeys.confirm, "f10");
        assert_eq!(cfg.execution.selection, SelectionStrategy::All);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [execution]
            auto_execute = true
            selection = { nearest_center = { max_actions = 2 } }

            [confirmation]
            backend = "terminal"
            on_unavailable = "proceed"
            "#,
        )
        .unwrap();
        assert!(cfg.execution.auto_execute);
        assert_eq!(cfg.execution.keystroke_interval_ms, 50);
        assert_eq!(
            cfg.execution.selection,
            SelectionStrategy::NearestCenter { max_actions: 2 }
        );
        assert_eq!(cfg.confirmation.backend, SignalBackend::Terminal);
        assert_eq!(cfg.confirmation.on_unavailable, UnavailablePolicy::Proceed);
        assert_eq!(cfg.confirmation.poll_interval_ms, 50);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", " sk-test "),
            ("DESKPILOT_AUTO_EXECUTE", "Yes"),
            ("DESKPILOT_OCR_THRESHOLD", "55"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-test"));
        assert!(cfg.execution.auto_execute);
        assert_eq!(cfg.analysis.ocr_confidence_threshold, 55);
    }

    #[test]
    fn invalid_threshold_override_is_ignored() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| {
            (k == "DESKPILOT_OCR_THRESHOLD").then(|| "250".to_string())
        });
        assert_eq!(cfg.analysis.ocr_confidence_threshold, 30);
    }

    #[test]
    fn save_then_load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.analysis.ocr_confidence_threshold = 42;
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.analysis.ocr_confidence_threshold, 42);
    }
}
