use std::time::Duration;

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::executor::keys::{KeyCombo, KeyName, NamedKey};
use crate::perception::types::Dimensions;

/// The four operations the executor needs from a pointer/keyboard backend.
pub trait DeviceControl {
    fn move_and_click(&mut self, x: i32, y: i32) -> DeskPilotResult<()>;

    fn type_text(&mut self, text: &str, per_char_delay: Duration) -> DeskPilotResult<()>;

    fn press_key(&mut self, combo: &KeyCombo) -> DeskPilotResult<()>;

    /// `None` when the backend cannot tell.
    fn current_screen_size(&self) -> Option<Dimensions>;
}

pub struct EnigoDevice {
    enigo: Enigo,
}

impl EnigoDevice {
    pub fn new() -> DeskPilotResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| DeskPilotError::Device(format!("enigo init: {e}")))?;
        tracing::info!("input device ready");
        Ok(Self { enigo })
    }
}

fn device_err(op: &str, e: impl std::fmt::Display) -> DeskPilotError {
    DeskPilotError::Device(format!("{op}: {e}"))
}

fn to_enigo(key: KeyName) -> Key {
    match key {
        KeyName::Char(c) => Key::Unicode(c),
        KeyName::Function(n) => match n {
            1 => Key::F1,
            2 => Key::F2,
            3 => Key::F3,
            4 => Key::F4,
            5 => Key::F5,
            6 => Key::F6,
            7 => Key::F7,
            8 => Key::F8,
            9 => Key::F9,
            10 => Key::F10,
            11 => Key::F11,
            _ => Key::F12,
        },
        KeyName::Named(named) => match named {
            NamedKey::Enter => Key::Return,
            NamedKey::Tab => Key::Tab,
            NamedKey::Space => Key::Space,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Delete => Key::Delete,
            NamedKey::Escape => Key::Escape,
            NamedKey::Up => Key::UpArrow,
            NamedKey::Down => Key::DownArrow,
            NamedKey::Left => Key::LeftArrow,
            NamedKey::Right => Key::RightArrow,
            NamedKey::Home => Key::Home,
            NamedKey::End => Key::End,
            NamedKey::PageUp => Key::PageUp,
            NamedKey::PageDown => Key::PageDown,
            NamedKey::CapsLock => Key::CapsLock,
            NamedKey::Control => Key::Control,
            NamedKey::Shift => Key::Shift,
            NamedKey::Alt => Key::Alt,
            NamedKey::Meta => Key::Meta,
        },
    }
}

impl DeviceControl for EnigoDevice {
    fn move_and_click(&mut self, x: i32, y: i32) -> DeskPilotResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| device_err("move", e))?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| device_err("click", e))?;
        tracing::debug!(x, y, "clicked");
        Ok(())
    }

    fn type_text(&mut self, text: &str, per_char_delay: Duration) -> DeskPilotResult<()> {
        let mut buf = [0u8; 4];
        for c in text.chars() {
            self.enigo
                .text(c.encode_utf8(&mut buf))
                .map_err(|e| device_err("type", e))?;
            if !per_char_delay.is_zero() {
                std::thread::sleep(per_char_delay);
            }
        }
        tracing::debug!(chars = text.chars().count(), "typed text");
        Ok(())
    }

    fn press_key(&mut self, combo: &KeyCombo) -> DeskPilotResult<()> {
        let mut held = Vec::with_capacity(combo.modifiers.len());
        let mut result = Ok(());
        for m in &combo.modifiers {
            let key = to_enigo(KeyName::Named(*m));
            if let Err(e) = self.enigo.key(key, Direction::Press) {
                result = Err(device_err("modifier press", e));
                break;
            }
            held.push(key);
        }
        if result.is_ok() {
            result = self
                .enigo
                .key(to_enigo(combo.key), Direction::Click)
                .map_err(|e| device_err("key", e));
        }
        // always release what was pressed, innermost first
        for key in held.into_iter().rev() {
            if let Err(e) = self.enigo.key(key, Direction::Release) {
                tracing::warn!(error = %e, "modifier release failed");
            }
        }
        if result.is_ok() {
            tracing::debug!(combo = %combo, "key pressed");
        }
        result
    }

    fn current_screen_size(&self) -> Option<Dimensions> {
        match self.enigo.main_display() {
            Ok((w, h)) if w > 0 && h > 0 => Some(Dimensions::new(w as u32, h as u32)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not query display size");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum DeviceOp {
        Click(i32, i32),
        Type(String, Duration),
        Press(String),
    }

    /// Records every operation; optionally fails clicks at one coordinate.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingDevice {
        pub ops: Arc<Mutex<Vec<DeviceOp>>>,
        pub screen: Option<Dimensions>,
        pub fail_click_at: Option<(i32, i32)>,
    }

    impl DeviceControl for RecordingDevice {
        fn move_and_click(&mut self, x: i32, y: i32) -> DeskPilotResult<()> {
            if self.fail_click_at == Some((x, y)) {
                return Err(DeskPilotError::Device("pointer grabbed".into()));
            }
            self.ops.lock().unwrap().push(DeviceOp::Click(x, y));
            Ok(())
        }

        fn type_text(&mut self, text: &str, per_char_delay: Duration) -> DeskPilotResult<()> {
            self.ops
                .lock()
                .unwrap()
                .push(DeviceOp::Type(text.to_string(), per_char_delay));
            Ok(())
        }

        fn press_key(&mut self, combo: &KeyCombo) -> DeskPilotResult<()> {
            self.ops.lock().unwrap().push(DeviceOp::Press(combo.to_string()));
            Ok(())
        }

        fn current_screen_size(&self) -> Option<Dimensions> {
            self.screen
        }
    }

    #[test]
    fn function_keys_map_in_range() {
        assert_eq!(to_enigo(KeyName::Function(9)), Key::F9);
        assert_eq!(to_enigo(KeyName::Named(NamedKey::Enter)), Key::Return);
        assert_eq!(to_enigo(KeyName::Char('q')), Key::Unicode('q'));
    }
}
