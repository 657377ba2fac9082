//! Connection indicator shown around the presentation surface.

use std::fmt;

use crate::ConnectionState;

/// Border color reflecting the mesh session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorColor {
    /// No session.
    Red,
    /// Session being set up.
    Orange,
    /// Session established.
    Green,
}

impl IndicatorColor {
    /// Lowercase color name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Green => "green",
        }
    }

    /// sRGB components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Red => (255, 0, 0),
            Self::Orange => (255, 128, 0),
            Self::Green => (0, 255, 0),
        }
    }
}

impl From<ConnectionState> for IndicatorColor {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::NotConnected => Self::Red,
            ConnectionState::Connecting => Self::Orange,
            ConnectionState::Connected => Self::Green,
        }
    }
}

impl fmt::Display for IndicatorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
