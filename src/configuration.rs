use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Menus that can be open in the configurator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MenuId {
    Body,
    Rims,
    Glass,
}

impl MenuId {
    pub const ALL: [MenuId; 3] = [MenuId::Body, MenuId::Rims, MenuId::Glass];

    /// Case-insensitive lookup used by settings files and event scripts.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "body" | "paint" => Some(MenuId::Body),
            "rims" | "rim" | "wheels" => Some(MenuId::Rims),
            "glass" | "windows" | "tint" => Some(MenuId::Glass),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MenuId::Body => "body",
            MenuId::Rims => "rims",
            MenuId::Glass => "glass",
        }
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discrete events emitted by the menu and color picker widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    SelectBodyColor(Color),
    SelectRimColor(Color),
    SelectGlassTint(Color),
    ClearRimColor,
    ClearGlassTint,
    ToggleMenu(MenuId),
    SelectView(usize),
}

/// Attribute selections and the currently open menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationState {
    pub body_color: Color,
    pub rim_color: Option<Color>,
    pub glass_tint: Option<Color>,
    active_menu: Option<MenuId>,
    pub showcase_view: usize,
    pub visible: bool,
}

impl ConfigurationState {
    pub fn new(body_color: Color) -> Self {
        Self {
            body_color,
            rim_color: None,
            glass_tint: None,
            active_menu: None,
            showcase_view: 0,
            visible: true,
        }
    }

    pub fn active_menu(&self) -> Option<MenuId> {
        self.active_menu
    }

    /// Opens `menu`, closing any other; toggling the open menu closes it.
    pub fn toggle_menu(&mut self, menu: MenuId) {
        self.active_menu = if self.active_menu == Some(menu) {
            None
        } else {
            Some(menu)
        };
    }

    pub fn close_menu(&mut self) {
        self.active_menu = None;
    }

    /// Applies a UI event. Returns `true` when the state changed.
    pub fn apply(&mut self, event: UiEvent) -> bool {
        let before = self.clone();
        match event {
            UiEvent::SelectBodyColor(color) => self.body_color = color,
            UiEvent::SelectRimColor(color) => self.rim_color = Some(color),
            UiEvent::SelectGlassTint(color) => self.glass_tint = Some(color),
            UiEvent::ClearRimColor => self.rim_color = None,
            UiEvent::ClearGlassTint => self.glass_tint = None,
            UiEvent::ToggleMenu(menu) => self.toggle_menu(menu),
            UiEvent::SelectView(index) => self.showcase_view = index,
        }
        let changed = *self != before;
        if changed {
            debug!("applied {event:?}: menu={:?}", self.active_menu);
        }
        changed
    }
}
