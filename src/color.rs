use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ColorParseError;

/// 8-bit sRGB color as picked in the configurator menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`, `#RGB` (leading `#` optional) or three decimal
    /// components separated by whitespace or commas.
    pub fn parse(value: &str) -> Result<Self, ColorParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ColorParseError::Empty);
        }
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorParseError::InvalidHex(trimmed.into()));
        }
        if trimmed.contains(|c: char| c.is_whitespace() || c == ',') {
            return parse_components(trimmed);
        }
        parse_hex(trimmed).ok_or_else(|| ColorParseError::InvalidHex(trimmed.into()))
    }

    /// Normalized sRGB components in `0.0..=1.0`.
    pub fn to_srgb(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    /// Linear-light components for shading.
    pub fn to_linear(self) -> Vec3 {
        let srgb = self.to_srgb();
        Vec3::new(
            srgb_to_linear(srgb.x),
            srgb_to_linear(srgb.y),
            srgb_to_linear(srgb.z),
        )
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        let mixed = self.to_srgb().lerp(other.to_srgb(), t.clamp(0.0, 1.0));
        Color::from_srgb(mixed)
    }

    pub fn from_srgb(value: Vec3) -> Color {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::rgb(to_byte(value.x), to_byte(value.y), to_byte(value.z))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
        }
        3 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Color::rgb(channel(0)?, channel(1)?, channel(2)?))
        }
        _ => None,
    }
}

fn parse_components(value: &str) -> Result<Color, ColorParseError> {
    let parts: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() != 3 {
        return Err(ColorParseError::MissingComponents(value.into()));
    }
    let component = |part: &str| {
        part.parse::<u8>()
            .map_err(|_| ColorParseError::InvalidComponent(part.into()))
    };
    Ok(Color::rgb(
        component(parts[0])?,
        component(parts[1])?,
        component(parts[2])?,
    ))
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
