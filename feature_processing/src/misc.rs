use serde::{Deserialize, Serialize};

pub const DATE: &str = "date";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

pub const RETURN_T1: &str = "return_t1";
pub const TARGET: &str = "target";
pub const TARGET_ENCODED: &str = "target_encoded";

pub const REQUIRED_PRICE_COLUMNS: [&str; 4] = [OPEN, HIGH, LOW, CLOSE];

pub const TECHNICAL_FEATURES: [&str; 11] = [
    "SMA_30",
    "SMA_90",
    "SMA_crossover",
    "RSI",
    "ATR",
    "volatility_30d",
    "volatility_rolling",
    "sma_ratio",
    "return_t",
    "volume_ratio",
    "volume_trend",
];

pub const TEMPORAL_FEATURES: [&str; 8] = [
    "month",
    "quarter",
    "day_of_week",
    "is_month_end",
    "month_sin",
    "month_cos",
    "day_sin",
    "day_cos",
];

/// Next-day move beyond which a day is labelled up or down.
pub const DIRECTION_THRESHOLD: f64 = 0.001;

pub const NUM_CLASSES: usize = 3;

/// Ternary next-day direction. Discriminants are the encoded class ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down = 0,
    Neutral = 1,
    Up = 2,
}

impl Direction {
    pub const ALL: [Direction; NUM_CLASSES] = [Direction::Down, Direction::Neutral, Direction::Up];

    pub fn from_return(next_return: f64) -> Self {
        if next_return > DIRECTION_THRESHOLD {
            Direction::Up
        } else if next_return < -DIRECTION_THRESHOLD {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Neutral => "neutral",
            Direction::Up => "up",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_strict() {
        assert_eq!(Direction::from_return(0.0011), Direction::Up);
        assert_eq!(Direction::from_return(0.001), Direction::Neutral);
        assert_eq!(Direction::from_return(-0.001), Direction::Neutral);
        assert_eq!(Direction::from_return(-0.0011), Direction::Down);
    }

    #[test]
    fn encoding_is_down_neutral_up() {
        assert_eq!(Direction::Down.index(), 0);
        assert_eq!(Direction::Neutral.index(), 1);
        assert_eq!(Direction::Up.index(), 2);
        assert_eq!(Direction::from_index(2), Some(Direction::Up));
        assert_eq!(Direction::from_index(3), None);
    }
}
