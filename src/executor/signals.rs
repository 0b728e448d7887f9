use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use device_query::{DeviceQuery, DeviceState, Keycode};

use crate::capability::Capability;
use crate::config::{AppConfig, SignalBackend};
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::directive::ActionDirective;
use crate::executor::gate::ConfirmationSource;
use crate::executor::keys::{KeyCombo, KeyName, NamedKey};

/// Keycodes that satisfy one key of a combo (either side for modifiers).
fn keycodes(key: KeyName) -> Option<Vec<Keycode>> {
    use Keycode as K;
    let codes = match key {
        KeyName::Function(n) => vec![match n {
            1 => K::F1,
            2 => K::F2,
            3 => K::F3,
            4 => K::F4,
            5 => K::F5,
            6 => K::F6,
            7 => K::F7,
            8 => K::F8,
            9 => K::F9,
            10 => K::F10,
            11 => K::F11,
            _ => K::F12,
        }],
        KeyName::Named(named) => match named {
            NamedKey::Enter => vec![K::Enter],
            NamedKey::Tab => vec![K::Tab],
            NamedKey::Space => vec![K::Space],
            NamedKey::Backspace => vec![K::Backspace],
            NamedKey::Delete => vec![K::Delete],
            NamedKey::Escape => vec![K::Escape],
            NamedKey::Up => vec![K::Up],
            NamedKey::Down => vec![K::Down],
            NamedKey::Left => vec![K::Left],
            NamedKey::Right => vec![K::Right],
            NamedKey::Home => vec![K::Home],
            NamedKey::End => vec![K::End],
            NamedKey::PageUp => vec![K::PageUp],
            NamedKey::PageDown => vec![K::PageDown],
            NamedKey::CapsLock => vec![K::CapsLock],
            NamedKey::Control => vec![K::LControl, K::RControl],
            NamedKey::Shift => vec![K::LShift, K::RShift],
            NamedKey::Alt => vec![K::LAlt, K::RAlt],
            NamedKey::Meta => return None,
        },
        KeyName::Char(c) => vec![match c.to_ascii_lowercase() {
            'a' => K::A,
            'b' => K::B,
            'c' => K::C,
            'd' => K::D,
            'e' => K::E,
            'f' => K::F,
            'g' => K::G,
            'h' => K::H,
            'i' => K::I,
            'j' => K::J,
            'k' => K::K,
            'l' => K::L,
            'm' => K::M,
            'n' => K::N,
            'o' => K::O,
            'p' => K::P,
            'q' => K::Q,
            'r' => K::R,
            's' => K::S,
            't' => K::T,
            'u' => K::U,
            'v' => K::V,
            'w' => K::W,
            'x' => K::X,
            'y' => K::Y,
            'z' => K::Z,
            '0' => K::Key0,
            '1' => K::Key1,
            '2' => K::Key2,
            '3' => K::Key3,
            '4' => K::Key4,
            '5' => K::Key5,
            '6' => K::Key6,
            '7' => K::Key7,
            '8' => K::Key8,
            '9' => K::Key9,
            _ => return None,
        }],
    };
    Some(codes)
}

/// A combo resolved to keycode alternatives, one group per key.
#[derive(Debug, Clone)]
pub struct Hotkey {
    label: String,
    groups: Vec<Vec<Keycode>>,
}

impl Hotkey {
    pub fn parse(spec: &str) -> DeskPilotResult<Self> {
        let combo: KeyCombo = spec
            .parse()
            .map_err(|e| DeskPilotError::Config(format!("hotkey '{spec}': {e}")))?;
        let mut groups = Vec::new();
        for key in combo
            .modifiers
            .iter()
            .map(|m| KeyName::Named(*m))
            .chain(std::iter::once(combo.key))
        {
            let codes = keycodes(key).ok_or_else(|| {
                DeskPilotError::Config(format!("hotkey '{spec}': '{key}' cannot be polled"))
            })?;
            groups.push(codes);
        }
        Ok(Self {
            label: combo.to_string(),
            groups,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_down(&self, pressed: &[Keycode]) -> bool {
        self.groups
            .iter()
            .all(|alts| alts.iter().any(|k| pressed.contains(k)))
    }
}

/// Global keyboard polling shared by the gate and the interactive loop.
pub struct KeyboardPoller {
    state: DeviceState,
}

impl KeyboardPoller {
    pub fn open() -> DeskPilotResult<Self> {
        let state = DeviceState::checked_new().ok_or_else(|| {
            DeskPilotError::Signal("keyboard state unavailable (no display or permission)".into())
        })?;
        Ok(Self { state })
    }

    pub fn pressed(&self) -> Vec<Keycode> {
        self.state.get_keys()
    }
}

/// Edge-tracked hotkey: a key already held when the gate arms does not
/// count until it has been released once.
struct Latched {
    key: Hotkey,
    latched: bool,
}

impl Latched {
    fn arm(&mut self, pressed: &[Keycode]) {
        self.latched = self.key.is_down(pressed);
    }

    fn active(&mut self, pressed: &[Keycode]) -> bool {
        let down = self.key.is_down(pressed);
        if !down {
            self.latched = false;
        }
        down && !self.latched
    }
}

pub struct HotkeySignals {
    poller: KeyboardPoller,
    confirm: Latched,
    cancel: Latched,
}

impl HotkeySignals {
    pub fn new(poller: KeyboardPoller, confirm: Hotkey, cancel: Hotkey) -> Self {
        Self {
            poller,
            confirm: Latched {
                key: confirm,
                latched: false,
            },
            cancel: Latched {
                key: cancel,
                latched: false,
            },
        }
    }
}

impl ConfirmationSource for HotkeySignals {
    fn arm(&mut self, directives: &[ActionDirective]) {
        let pressed = self.poller.pressed();
        self.confirm.arm(&pressed);
        self.cancel.arm(&pressed);
        for (i, d) in directives.iter().enumerate() {
            tracing::info!(step = i + 1, directive = %d, "proposed");
        }
        tracing::info!(
            confirm = self.confirm.key.label(),
            cancel = self.cancel.key.label(),
            "press confirm to execute or cancel to skip"
        );
    }

    fn is_confirm_active(&mut self) -> bool {
        let pressed = self.poller.pressed();
        self.confirm.active(&pressed)
    }

    fn is_cancel_active(&mut self) -> bool {
        let pressed = self.poller.pressed();
        self.cancel.active(&pressed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Pending,
    Confirm,
    Cancel,
}

fn interpret(line: &str) -> Answer {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Answer::Confirm,
        _ => Answer::Cancel,
    }
}

/// Prompts on stdout and reads the answer from stdin on a background thread.
/// `y`/`yes` confirms, any other line cancels.
pub struct TerminalSignals {
    lines: Receiver<String>,
    answer: Answer,
}

impl TerminalSignals {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    fn from_receiver(lines: Receiver<String>) -> Self {
        Self {
            lines,
            answer: Answer::Pending,
        }
    }

    fn poll(&mut self) -> Answer {
        if self.answer == Answer::Pending {
            match self.lines.try_recv() {
                Ok(line) => self.answer = interpret(&line),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.answer = Answer::Cancel,
            }
        }
        self.answer
    }
}

impl ConfirmationSource for TerminalSignals {
    fn arm(&mut self, directives: &[ActionDirective]) {
        // drop lines typed before this prompt
        while self.lines.try_recv().is_ok() {}
        self.answer = Answer::Pending;

        println!("Proposed actions:");
        for (i, d) in directives.iter().enumerate() {
            println!("  {}. {d}", i + 1);
        }
        println!("Execute? [y/N]");
    }

    fn is_confirm_active(&mut self) -> bool {
        self.poll() == Answer::Confirm
    }

    fn is_cancel_active(&mut self) -> bool {
        self.poll() == Answer::Cancel
    }
}

/// Open the configured confirmation source.
pub fn open_confirmation_source(cfg: &AppConfig) -> Capability<Box<dyn ConfirmationSource>> {
    match cfg.confirmation.backend {
        SignalBackend::None => Capability::unavailable("confirmation backend set to none"),
        SignalBackend::Terminal => Capability::Available(Box::new(TerminalSignals::spawn())),
        SignalBackend::Hotkey => {
            let opened = KeyboardPoller::open().and_then(|poller| {
                let confirm = Hotkey::parse(&cfg.hotkeys.confirm)?;
                let cancel = Hotkey::parse(&cfg.hotkeys.cancel)?;
                Ok(Box::new(HotkeySignals::new(poller, confirm, cancel))
                    as Box<dyn ConfirmationSource>)
            });
            opened.into()
        }
    }
}
