use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Check prices and volume for a single bar.
    pub fn validate(&self, index: usize) -> Result<(), AppError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::MalformedBar {
                    index,
                    message: format!("{} must be a positive finite price, got {}", name, value),
                });
            }
        }
        if self.high < self.low {
            return Err(AppError::MalformedBar {
                index,
                message: format!("high {} is below low {}", self.high, self.low),
            });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(AppError::MalformedBar {
                index,
                message: format!("volume must be non-negative, got {}", self.volume),
            });
        }
        Ok(())
    }
}

/// Validate a whole series: non-empty, well-formed bars, strictly ascending dates.
/// Missing dates between bars are fine.
pub fn validate_series(bars: &[Bar]) -> Result<(), AppError> {
    if bars.is_empty() {
        return Err(AppError::EmptySeries);
    }
    for (i, bar) in bars.iter().enumerate() {
        bar.validate(i)?;
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(AppError::UnorderedBars { index: i });
        }
    }
    Ok(())
}
