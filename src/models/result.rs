use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::brick::Brick;
use super::config::{RenkoMode, SizingMode, StrategyParams};
use super::signal::Signal;
use super::trade::{OpenPosition, Trade};
use crate::errors::ErrorResponse;

/// A point on the equity curve, one per brick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub brick_index: usize,
    pub date: NaiveDate,
    pub equity: f64,
}

/// A point on the drawdown curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub brick_index: usize,
    pub drawdown_pct: f64,
}

/// Summary statistics of a simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    // Returns
    pub final_equity: f64,
    pub total_return_pct: f64,

    // Drawdown
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration_bricks: usize,
    pub avg_drawdown_pct: f64,

    // Trades
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,

    // P&L (realized)
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_profit: f64,
    pub profit_factor: f64,
    pub avg_trade: f64,
    pub largest_win: f64,
    pub largest_loss: f64,

    // Consistency
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    // Stagnation & Ulcer
    pub stagnation_bricks: usize,
    pub ulcer_index_pct: f64,

    pub return_dd_ratio: f64,
}

/// Complete output of one portfolio simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub cash: f64,
    /// Position still held after the last brick, marked to market in `final_equity`.
    pub open_position: Option<OpenPosition>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub drawdown_curve: Vec<DrawdownPoint>,
    pub metrics: PortfolioMetrics,
}

/// Output of a single brick -> signal -> portfolio pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub params: StrategyParams,
    /// Daily size, or the size of the most recent ATR-derived brick (0 with no bricks).
    pub brick_size: f64,
    pub bricks: Vec<Brick>,
    pub signals: Vec<Signal>,
    pub portfolio: PortfolioResult,
}

// ══════════════════════════════════════════════════════════════
// Optimization types
// ══════════════════════════════════════════════════════════════

/// One grid cell. ATR fields are `None` in daily mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
    pub mode: RenkoMode,
    pub atr_period: Option<usize>,
    pub atr_multiplier: Option<f64>,
    pub buy_trend_length: usize,
    pub sell_trend_length: usize,
}

impl OptimizationParams {
    pub fn daily(buy_trend_length: usize, sell_trend_length: usize) -> Self {
        Self {
            mode: RenkoMode::Daily,
            atr_period: None,
            atr_multiplier: None,
            buy_trend_length,
            sell_trend_length,
        }
    }

    pub fn atr(
        period: usize,
        multiplier: f64,
        buy_trend_length: usize,
        sell_trend_length: usize,
    ) -> Self {
        Self {
            mode: RenkoMode::Atr,
            atr_period: Some(period),
            atr_multiplier: Some(multiplier),
            buy_trend_length,
            sell_trend_length,
        }
    }

    /// Daily cells always derive their size from the bars.
    pub fn strategy_params(&self) -> StrategyParams {
        let sizing = match (self.mode, self.atr_period, self.atr_multiplier) {
            (RenkoMode::Atr, Some(period), Some(multiplier)) => SizingMode::Atr { period, multiplier },
            (RenkoMode::Atr, period, multiplier) => SizingMode::Atr {
                period: period.unwrap_or(0),
                multiplier: multiplier.unwrap_or(0.0),
            },
            (RenkoMode::Daily, _, _) => SizingMode::Daily { size: None },
        };
        StrategyParams {
            sizing,
            buy_trend_length: self.buy_trend_length,
            sell_trend_length: self.sell_trend_length,
        }
    }

    /// Fixed total order: mode (daily first), period, multiplier, buy length, sell length.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.mode
            .cmp(&other.mode)
            .then_with(|| self.atr_period.cmp(&other.atr_period))
            .then_with(|| cmp_optional_f64(self.atr_multiplier, other.atr_multiplier))
            .then_with(|| self.buy_trend_length.cmp(&other.buy_trend_length))
            .then_with(|| self.sell_trend_length.cmp(&other.sell_trend_length))
    }

    pub fn label(&self) -> String {
        match (self.atr_period, self.atr_multiplier) {
            (Some(p), Some(m)) => format!(
                "{} period={} multiplier={} buy={} sell={}",
                self.mode, p, m, self.buy_trend_length, self.sell_trend_length
            ),
            _ => format!(
                "{} buy={} sell={}",
                self.mode, self.buy_trend_length, self.sell_trend_length
            ),
        }
    }
}

fn cmp_optional_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// A single successful result from an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub params: OptimizationParams,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    pub final_equity: f64,
    pub brick_count: usize,
    pub brick_size: f64,
}

/// A grid cell that could not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRun {
    pub params: OptimizationParams,
    pub error: ErrorResponse,
}

/// Everything a grid search hands to the reporting side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    /// Successful cells, best first.
    pub ranked: Vec<OptimizationResult>,
    /// Failed cells, in canonical parameter order.
    pub skipped: Vec<SkippedRun>,
    /// Size of the full grid before truncation.
    pub total_combinations: usize,
    /// Number of cells actually run.
    pub evaluated: usize,
    /// Full pipeline output of the top-ranked cell.
    pub best_run: RunResult,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.ranked.first()
    }
}
