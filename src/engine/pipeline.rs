use tracing::info;

use crate::errors::AppError;
use crate::models::bar::Bar;
use crate::models::brick::Brick;
use crate::models::config::{validate_capital, SizingMode, StrategyParams};
use crate::models::result::RunResult;

use super::{bricks, signals, simulator};

/// Run bricks -> signals -> portfolio for one parameter set.
pub fn run(
    bars: &[Bar],
    params: &StrategyParams,
    initial_capital: f64,
) -> Result<RunResult, AppError> {
    info!(
        "Starting run: {} bars, sizing={:?}, buy={}, sell={}",
        bars.len(),
        params.sizing,
        params.buy_trend_length,
        params.sell_trend_length
    );

    let result = execute(bars, params, None, initial_capital)?;

    info!(
        "Run complete: {} bricks, {} trades, return {:.2}%",
        result.bricks.len(),
        result.portfolio.trades.len(),
        result.portfolio.metrics.total_return_pct
    );
    Ok(result)
}

/// Pipeline body without run-level logging. In ATR mode a precomputed ATR
/// series for the params' period may be supplied so the optimizer computes
/// each period once per grid.
pub(crate) fn execute(
    bars: &[Bar],
    params: &StrategyParams,
    atr: Option<&[Option<f64>]>,
    initial_capital: f64,
) -> Result<RunResult, AppError> {
    params.validate()?;
    validate_capital(initial_capital)?;

    let bricks = match (params.sizing, atr) {
        (SizingMode::Atr { multiplier, .. }, Some(atr)) => {
            bricks::build_with_atr(bars, atr, multiplier)?
        }
        _ => bricks::build(bars, &params.sizing)?,
    };
    finish(bars, params, bricks, initial_capital)
}

fn finish(
    bars: &[Bar],
    params: &StrategyParams,
    bricks: Vec<Brick>,
    initial_capital: f64,
) -> Result<RunResult, AppError> {
    let signals = signals::generate(&bricks, params.buy_trend_length, params.sell_trend_length)?;
    let portfolio = simulator::simulate(&bricks, &signals, initial_capital)?;

    Ok(RunResult {
        params: *params,
        brick_size: resolved_brick_size(bars, &params.sizing, &bricks),
        bricks,
        signals,
        portfolio,
    })
}

/// Daily size in force for the run, or the size of the latest ATR brick.
fn resolved_brick_size(bars: &[Bar], sizing: &SizingMode, built: &[Brick]) -> f64 {
    match *sizing {
        SizingMode::Daily { size: Some(size) } => size,
        SizingMode::Daily { size: None } => bricks::daily_brick_size(bars),
        SizingMode::Atr { .. } => built.last().map(|b| b.size).unwrap_or(0.0),
    }
}
