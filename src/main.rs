//! deskpilot - analyse the screen, ask a model what to do, and replay its
//! CLICK / TYPE / PRESS directives after confirmation.
//!
//! Usage:
//!   deskpilot                       interactive: f9 runs a cycle, f12 exits
//!   deskpilot --once                one cycle on the primary monitor
//!   deskpilot --image shot.png      one cycle on a saved screenshot
//!   deskpilot --parse-only reply.txt

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use deskpilot::agent_engine::{CycleRunner, LoopController};
use deskpilot::config::{self, AppConfig};
use deskpilot::errors::DeskPilotResult;
use deskpilot::executor::parser;
use deskpilot::executor::signals::{Hotkey, KeyboardPoller};
use deskpilot::perception::screenshot::{ImageFile, PrimaryMonitor, ScreenSource};

#[derive(Parser, Debug)]
#[command(name = "deskpilot")]
#[command(about = "Screen analysis to desktop action pipeline")]
#[command(version)]
struct Args {
    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Analyse this image instead of capturing the screen (implies --once)
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Execute directives without waiting for confirmation
    #[arg(long)]
    auto_execute: bool,

    /// Parse directives from a saved model response ("-" for stdin) and print them
    #[arg(long, value_name = "FILE")]
    parse_only: Option<PathBuf>,
}

const TRIGGER_POLL: Duration = Duration::from_millis(50);

fn main() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    deskpilot::init_tracing("info");

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "deskpilot stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> DeskPilotResult<()> {
    if let Some(path) = &args.parse_only {
        return parse_only(path);
    }

    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config, using defaults");
            let mut cfg = AppConfig::default();
            config::apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
            cfg
        }
    };

    let mut runner = CycleRunner::from_config(&cfg, args.auto_execute)?;
    let source: Box<dyn ScreenSource> = match &args.image {
        Some(path) => Box::new(ImageFile::new(path)),
        None => Box::new(PrimaryMonitor),
    };

    if args.once || args.image.is_some() {
        let record = runner.run_cycle(source.as_ref());
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    interactive(&cfg, &mut runner, source.as_ref())
}

fn parse_only(path: &Path) -> DeskPilotResult<()> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    let directives = parser::parse(&text);
    tracing::info!(count = directives.len(), "directives parsed");
    for directive in &directives {
        println!("{}", serde_json::to_string(directive)?);
    }
    Ok(())
}

/// Set once Ctrl-C arrives. The signal is awaited on a helper thread so the
/// synchronous trigger loop only has to read a flag.
fn ctrl_c_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = flag.clone();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!(error = %e, "ctrl-c handler not installed");
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            setter.store(true, Ordering::SeqCst);
        }
    });
    flag
}

fn interactive(
    cfg: &AppConfig,
    runner: &mut CycleRunner,
    source: &dyn ScreenSource,
) -> DeskPilotResult<()> {
    let poller = KeyboardPoller::open()?;
    let trigger = Hotkey::parse(&cfg.hotkeys.trigger)?;
    let exit = Hotkey::parse(&cfg.hotkeys.exit)?;
    let interrupted = ctrl_c_flag();
    let mut limits = LoopController::new(&cfg.session);

    tracing::info!(
        source = %source.describe(),
        trigger = trigger.label(),
        exit = exit.label(),
        "ready, press trigger to analyse the screen"
    );

    let mut trigger_held = false;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            tracing::info!("interrupted");
            break;
        }
        let pressed = poller.pressed();
        if exit.is_down(&pressed) {
            tracing::info!("exit hotkey pressed");
            break;
        }

        let down = trigger.is_down(&pressed);
        if down && !trigger_held {
            let record = runner.run_cycle(source);
            limits.record(&record.outcome);
            if let Some(reason) = limits.stop_reason() {
                tracing::info!(%reason, cycles = limits.cycles(), "session limit reached");
                break;
            }
            tracing::info!(trigger = trigger.label(), "ready for the next cycle");
        }
        trigger_held = down;
        std::thread::sleep(TRIGGER_POLL);
    }
    Ok(())
}
