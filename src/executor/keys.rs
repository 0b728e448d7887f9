use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedKey {
    Enter,
    Tab,
    Space,
    Backspace,
    Delete,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    CapsLock,
    Control,
    Shift,
    Alt,
    Meta,
}

impl NamedKey {
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            NamedKey::Control | NamedKey::Shift | NamedKey::Alt | NamedKey::Meta
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyName {
    Named(NamedKey),
    /// F1 through F12.
    Function(u8),
    /// A single printable, non-whitespace character.
    Char(char),
}

impl FromStr for KeyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let named = match lower.as_str() {
            "enter" | "return" => Some(NamedKey::Enter),
            "tab" => Some(NamedKey::Tab),
            "space" | "spacebar" => Some(NamedKey::Space),
            "backspace" => Some(NamedKey::Backspace),
            "delete" | "del" => Some(NamedKey::Delete),
            "escape" | "esc" => Some(NamedKey::Escape),
            "up" | "arrowup" | "up_arrow" => Some(NamedKey::Up),
            "down" | "arrowdown" | "down_arrow" => Some(NamedKey::Down),
            "left" | "arrowleft" | "left_arrow" => Some(NamedKey::Left),
            "right" | "arrowright" | "right_arrow" => Some(NamedKey::Right),
            "home" => Some(NamedKey::Home),
            "end" => Some(NamedKey::End),
            "pageup" | "page_up" | "pgup" => Some(NamedKey::PageUp),
            "pagedown" | "page_down" | "pgdn" => Some(NamedKey::PageDown),
            "capslock" | "caps_lock" => Some(NamedKey::CapsLock),
            "ctrl" | "control" => Some(NamedKey::Control),
            "shift" => Some(NamedKey::Shift),
            "alt" | "option" => Some(NamedKey::Alt),
            "meta" | "cmd" | "command" | "win" | "super" => Some(NamedKey::Meta),
            _ => None,
        };
        if let Some(k) = named {
            return Ok(KeyName::Named(k));
        }

        if let Some(n) = lower.strip_prefix('f').and_then(|d| d.parse::<u8>().ok()) {
            if (1..=12).contains(&n) {
                return Ok(KeyName::Function(n));
            }
        }

        let mut chars = lower.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() && !c.is_whitespace() => Ok(KeyName::Char(c)),
            _ => Err(format!("unknown key '{s}'")),
        }
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Named(k) => write!(f, "{}", format!("{k:?}").to_lowercase()),
            KeyName::Function(n) => write!(f, "f{n}"),
            KeyName::Char(c) => write!(f, "{c}"),
        }
    }
}

/// A key optionally held with modifiers, e.g. `ctrl+shift+s`. Every key but
/// the last must be a modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    pub modifiers: Vec<NamedKey>,
    pub key: KeyName,
}

impl KeyCombo {
    pub fn single(key: KeyName) -> Self {
        Self {
            modifiers: Vec::new(),
            key,
        }
    }
}

impl FromStr for KeyCombo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // a lone "+" is the plus key, not an empty chord
        if s == "+" {
            return Ok(KeyCombo::single(KeyName::Char('+')));
        }

        let parts: Vec<&str> = s.split('+').collect();
        let (last, init) = parts
            .split_last()
            .ok_or_else(|| format!("empty key '{s}'"))?;
        let mut modifiers = Vec::with_capacity(init.len());
        for part in init {
            match part.parse::<KeyName>()? {
                KeyName::Named(m) if m.is_modifier() => modifiers.push(m),
                other => return Err(format!("'{other}' is not a modifier in '{s}'")),
            }
        }
        Ok(KeyCombo {
            modifiers,
            key: last.parse()?,
        })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{}+", KeyName::Named(*m))?;
        }
        write!(f, "{}", self.key)
    }
}
