use tracing::debug;

use crate::errors::AppError;
use crate::models::brick::Brick;
use crate::models::config::validate_capital;
use crate::models::result::{DrawdownPoint, EquityPoint, PortfolioResult};
use crate::models::signal::{Signal, SignalAction};
use crate::models::trade::{OpenPosition, Trade};

use super::metrics::{calculate_metrics, drawdown_pct};
use super::position::{close_position, mark_to_market, open_position};

/// Replay signals over their bricks as a long-only, all-in portfolio.
///
/// Fills happen at the brick close with no costs. A position still open after
/// the last brick is kept and marked to market in `final_equity`.
pub fn simulate(
    bricks: &[Brick],
    signals: &[Signal],
    initial_capital: f64,
) -> Result<PortfolioResult, AppError> {
    validate_capital(initial_capital)?;
    check_alignment(bricks, signals)?;

    let total_bricks = bricks.len();
    debug!(
        "Simulating {} bricks with capital {:.2}",
        total_bricks, initial_capital
    );

    let mut cash = initial_capital;
    let mut peak_equity = initial_capital;
    let mut position: Option<OpenPosition> = None;
    let mut trades: Vec<Trade> = Vec::new();
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(total_bricks);
    let mut drawdown_curve: Vec<DrawdownPoint> = Vec::with_capacity(total_bricks);

    for (brick, signal) in bricks.iter().zip(signals) {
        // ── 1. Act on the signal ──
        match signal.action {
            SignalAction::Buy if position.is_none() => {
                position = Some(open_position(cash, brick));
                cash = 0.0;
            }
            SignalAction::Sell => {
                if let Some(pos) = position.take() {
                    cash += pos.market_value(brick.close_price);
                    trades.push(close_position(&pos, brick));
                }
            }
            _ => {}
        }

        // ── 2. Record equity and drawdown ──
        let equity = mark_to_market(cash, position.as_ref(), brick.close_price);
        if equity > peak_equity {
            peak_equity = equity;
        }

        equity_curve.push(EquityPoint {
            brick_index: brick.sequence_index,
            date: brick.date,
            equity,
        });
        drawdown_curve.push(DrawdownPoint {
            brick_index: brick.sequence_index,
            drawdown_pct: drawdown_pct(peak_equity, equity),
        });
    }

    let final_equity = match bricks.last() {
        Some(last) => mark_to_market(cash, position.as_ref(), last.close_price),
        None => cash,
    };

    let metrics = calculate_metrics(&trades, &equity_curve, initial_capital, final_equity);

    debug!(
        "Simulation complete: {} trades, final equity {:.2}{}",
        trades.len(),
        final_equity,
        if position.is_some() { " (position open)" } else { "" }
    );

    Ok(PortfolioResult {
        initial_capital,
        final_equity,
        cash,
        open_position: position,
        trades,
        equity_curve,
        drawdown_curve,
        metrics,
    })
}

/// One signal per brick, in the same order.
fn check_alignment(bricks: &[Brick], signals: &[Signal]) -> Result<(), AppError> {
    if bricks.len() != signals.len() {
        return Err(AppError::SignalMismatch(format!(
            "{} bricks but {} signals",
            bricks.len(),
            signals.len()
        )));
    }
    if let Some((brick, signal)) = bricks
        .iter()
        .zip(signals)
        .find(|(b, s)| b.sequence_index != s.brick_index)
    {
        return Err(AppError::SignalMismatch(format!(
            "signal for brick {} found at brick {}",
            signal.brick_index, brick.sequence_index
        )));
    }
    Ok(())
}

/// Rebuild the final equity from the trade ledger and any open position.
pub fn replay_equity(result: &PortfolioResult, last_price: Option<f64>) -> f64 {
    let realized: f64 = result.trades.iter().map(|t| t.pnl).sum();
    let unrealized = match (&result.open_position, last_price) {
        (Some(pos), Some(price)) => pos.unrealized_pnl(price),
        _ => 0.0,
    };
    result.initial_capital + realized + unrealized
}
