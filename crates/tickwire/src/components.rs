//! # Ball Components
//!
//! `Position`, `Color` and `Radius` are what clients see. `Velocity` stays
//! on the server.

use std::fmt;

use serde::{Deserialize, Serialize};
use tickwire_core::Component;

/// Centre of a ball, in arena units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Component for Position {
    const KEY: &'static str = "position";
}

/// Units per second. Server-private.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Horizontal speed.
    pub x: f32,
    /// Vertical speed.
    pub y: f32,
}

impl Component for Velocity {
    const KEY: &'static str = "velocity";
}

/// Ball radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Radius(pub f32);

impl Component for Radius {
    const KEY: &'static str = "radius";
}

/// Paint colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Default for fresh balls.
    White,
    /// `red`.
    Red,
    /// `green`.
    Green,
    /// `blue`.
    Blue,
    /// `yellow`.
    Yellow,
    /// `purple`.
    Purple,
}

impl Color {
    /// Colours picked from when spawning without an explicit one.
    pub const PALETTE: [Self; 5] = [Self::Red, Self::Green, Self::Blue, Self::Yellow, Self::Purple];

    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
        }
    }
}

impl Component for Color {
    const KEY: &'static str = "color";
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rectangular play field, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    /// Width in arena units.
    pub width: f32,
    /// Height in arena units.
    pub height: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_wire_names() {
        assert_eq!(serde_json::to_value(Color::Red).unwrap(), serde_json::json!("red"));
        let purple: Color = serde_json::from_str("\"purple\"").unwrap();
        assert_eq!(purple, Color::Purple);
        assert!(Color::PALETTE.iter().all(|c| c.to_string() == c.name()));
    }
}
