use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configuration::MenuId;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            (Some(ch), None) if ch.is_ascii_digit() => Some(Self::Digit(ch as u8 - b'0')),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Named(key) => write!(f, "{key:?}"),
            KeyCode::Character(ch) => write!(f, "{ch}"),
            KeyCode::Digit(digit) => write!(f, "{digit}"),
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Escape" | "Esc" => Escape,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-printable keys the configurator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Escape,
}

/// Action bound to a key, standing in for the configurator's menu widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCommand {
    ToggleMenu(MenuId),
    /// Closes the open menu, or quits when none is open.
    Back,
    CycleSwatch(MenuId),
    ClearOverrides,
    NextView,
    Screenshot,
    ToggleVisibility,
}

impl fmt::Display for KeyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCommand::ToggleMenu(menu) => write!(f, "toggle the {menu} menu"),
            KeyCommand::Back => f.write_str("close the menu or quit"),
            KeyCommand::CycleSwatch(menu) => write!(f, "next {menu} swatch"),
            KeyCommand::ClearOverrides => f.write_str("reset rims and glass"),
            KeyCommand::NextView => f.write_str("next showcase view"),
            KeyCommand::Screenshot => f.write_str("save a screenshot"),
            KeyCommand::ToggleVisibility => f.write_str("hide or show the view"),
        }
    }
}

/// Key to command table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, KeyCommand>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, key: KeyCode, command: KeyCommand) -> Option<KeyCommand> {
        self.bindings.insert(key, command)
    }

    pub fn command(&self, key: KeyCode) -> Option<KeyCommand> {
        self.bindings.get(&key).copied()
    }

    /// Bindings ordered by key name, for help output.
    pub fn entries(&self) -> Vec<(KeyCode, KeyCommand)> {
        let mut entries: Vec<_> = self.bindings.iter().map(|(k, c)| (*k, *c)).collect();
        entries.sort_by_key(|(key, _)| key.to_string());
        entries
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = Self::empty();
        for (digit, menu) in (1u8..).zip(MenuId::ALL) {
            bindings.bind(KeyCode::Digit(digit), KeyCommand::ToggleMenu(menu));
        }
        bindings.bind(KeyCode::Named(NamedKey::Escape), KeyCommand::Back);
        bindings.bind(KeyCode::Character('C'), KeyCommand::CycleSwatch(MenuId::Body));
        bindings.bind(KeyCode::Character('R'), KeyCommand::CycleSwatch(MenuId::Rims));
        bindings.bind(KeyCode::Character('G'), KeyCommand::CycleSwatch(MenuId::Glass));
        bindings.bind(KeyCode::Character('N'), KeyCommand::ClearOverrides);
        bindings.bind(KeyCode::Character('V'), KeyCommand::NextView);
        bindings.bind(KeyCode::Character('P'), KeyCommand::Screenshot);
        bindings.bind(KeyCode::Character('H'), KeyCommand::ToggleVisibility);
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Esc"),
            Some(KeyCode::Named(NamedKey::Escape))
        );
        assert_eq!(KeyCode::from_name("c"), Some(KeyCode::Character('C')));
        assert_eq!(KeyCode::from_name("2"), Some(KeyCode::Digit(2)));
        assert_eq!(KeyCode::from_name("F12"), None);
    }

    #[test]
    fn default_bindings_cover_the_menus() {
        let bindings = KeyBindings::default();
        assert_eq!(
            bindings.command(KeyCode::Digit(2)),
            Some(KeyCommand::ToggleMenu(MenuId::Rims))
        );
        assert_eq!(
            bindings.command(KeyCode::Named(NamedKey::Escape)),
            Some(KeyCommand::Back)
        );
        assert_eq!(bindings.command(KeyCode::Character('Z')), None);
        assert_eq!(bindings.entries().len(), 10);
    }

    #[test]
    fn rebinding_replaces_the_previous_command() {
        let mut bindings = KeyBindings::default();
        let previous = bindings.bind(KeyCode::Character('P'), KeyCommand::NextView);
        assert_eq!(previous, Some(KeyCommand::Screenshot));
        assert_eq!(
            bindings.command(KeyCode::Character('P')),
            Some(KeyCommand::NextView)
        );
    }
}
