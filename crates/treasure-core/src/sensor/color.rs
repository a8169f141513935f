use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Colour reported by the proximity sensor, hottest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SensorColor {
    Red = 0,
    Orange = 1,
    Yellow = 2,
    Green = 3,
}

impl SensorColor {
    pub const ALL: [SensorColor; 4] = [
        SensorColor::Red,
        SensorColor::Orange,
        SensorColor::Yellow,
        SensorColor::Green,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SensorColor::Red),
            1 => Some(SensorColor::Orange),
            2 => Some(SensorColor::Yellow),
            3 => Some(SensorColor::Green),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SensorColor::Red => "red",
            SensorColor::Orange => "orange",
            SensorColor::Yellow => "yellow",
            SensorColor::Green => "green",
        }
    }
}

impl fmt::Display for SensorColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sensor colour '{}'", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for SensorColor {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorColor::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseColorError(s.to_string()))
    }
}
