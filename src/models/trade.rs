use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A completed long round trip. Created when a sell closes the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_brick_index: usize,
    pub exit_brick_index: usize,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub return_pct: f64,
    /// Number of bricks between entry and exit.
    pub duration_bricks: usize,
}

/// A long position that is still held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_brick_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }
}
