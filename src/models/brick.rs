use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a Renko brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1.0 for up bricks, -1.0 for down bricks.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// A fixed-height price block.
///
/// `close_price - open_price == direction.sign() * size`. The size is frozen
/// when the brick is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    /// 1-based position in the brick sequence.
    pub sequence_index: usize,
    pub direction: Direction,
    pub open_price: f64,
    pub close_price: f64,
    pub size: f64,
    /// Index of the bar whose close produced this brick.
    pub source_bar_index: usize,
    pub date: NaiveDate,
}

impl Brick {
    pub fn high(&self) -> f64 {
        self.open_price.max(self.close_price)
    }

    pub fn low(&self) -> f64 {
        self.open_price.min(self.close_price)
    }
}
