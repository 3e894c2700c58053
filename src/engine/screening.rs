use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::config::{RenkoConfig, MAX_RECENT_SIGNAL_DAYS};
use crate::models::result::RunResult;
use crate::models::signal::SignalAction;

/// Thresholds for flagging a run as actionable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningCriteria {
    /// How many of the most recent bar dates count as "recent".
    pub recent_signal_days: usize,
    /// Total return (percent) the run must exceed.
    pub target_return_pct: f64,
}

impl ScreeningCriteria {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.recent_signal_days == 0 || self.recent_signal_days > MAX_RECENT_SIGNAL_DAYS {
            return Err(AppError::InvalidConfig(format!(
                "recent_signal_days must be between 1 and {}, got {}",
                MAX_RECENT_SIGNAL_DAYS, self.recent_signal_days
            )));
        }
        if !self.target_return_pct.is_finite() {
            return Err(AppError::InvalidConfig("target_return_pct must be finite".into()));
        }
        Ok(())
    }
}

impl From<&RenkoConfig> for ScreeningCriteria {
    fn from(config: &RenkoConfig) -> Self {
        Self {
            recent_signal_days: config.recent_signal_days,
            target_return_pct: config.target_return_pct,
        }
    }
}

/// A buy or sell located on its brick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub action: SignalAction,
    pub brick_index: usize,
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub last_buy: Option<SignalEvent>,
    pub last_sell: Option<SignalEvent>,
    /// Latest buy or sell dated within the recent window.
    pub recent_signal: Option<SignalEvent>,
    pub has_recent_buy: bool,
    pub currently_long: bool,
    pub total_return_pct: f64,
    pub meets_target: bool,
    pub is_candidate: bool,
}

/// Summarize the latest signals of a run against the screening thresholds.
///
/// The recent window is the last `recent_signal_days` bar dates of `bars`,
/// so weekends and holidays without bars do not count.
pub fn screen(
    run: &RunResult,
    bars: &[Bar],
    criteria: &ScreeningCriteria,
) -> Result<ScreeningReport, AppError> {
    criteria.validate()?;
    if bars.is_empty() {
        return Err(AppError::EmptySeries);
    }

    let window_start = bars[bars.len().saturating_sub(criteria.recent_signal_days)].date;

    let events: Vec<SignalEvent> = run
        .signals
        .iter()
        .zip(&run.bricks)
        .filter(|(s, _)| s.action != SignalAction::Hold)
        .map(|(s, b)| SignalEvent {
            action: s.action,
            brick_index: b.sequence_index,
            date: b.date,
            price: b.close_price,
        })
        .collect();

    let last_of = |action: SignalAction| events.iter().rev().find(|e| e.action == action).cloned();
    let last_buy = last_of(SignalAction::Buy);
    let last_sell = last_of(SignalAction::Sell);
    let recent_signal = events
        .iter()
        .rev()
        .find(|e| e.date >= window_start)
        .cloned();

    let has_recent_buy = last_buy.as_ref().is_some_and(|e| e.date >= window_start);
    let total_return_pct = run.portfolio.metrics.total_return_pct;
    let meets_target = total_return_pct > criteria.target_return_pct;

    Ok(ScreeningReport {
        last_buy,
        last_sell,
        recent_signal,
        has_recent_buy,
        currently_long: run.portfolio.open_position.is_some(),
        total_return_pct,
        meets_target,
        is_candidate: has_recent_buy && meets_target,
    })
}
