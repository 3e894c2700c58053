use crate::models::result::{EquityPoint, PortfolioMetrics};
use crate::models::trade::Trade;

/// Calculate run metrics from closed trades and the per-brick equity curve.
///
/// `final_equity` includes any position still open, so the return reflects the
/// marked-to-market result while the P&L fields cover realized trades only.
pub fn calculate_metrics(
    trades: &[Trade],
    equity_curve: &[EquityPoint],
    initial_capital: f64,
    final_equity: f64,
) -> PortfolioMetrics {
    if trades.is_empty() && equity_curve.is_empty() {
        return empty_metrics(initial_capital);
    }

    let total_trades = trades.len();

    // ── Trade classification ──
    let winning: Vec<&Trade> = trades.iter().filter(|t| t.pnl > 0.0).collect();
    let losing: Vec<&Trade> = trades.iter().filter(|t| t.pnl < 0.0).collect();

    let winning_trades = winning.len();
    let losing_trades = losing.len();
    let win_rate_pct = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    // ── P&L ──
    let gross_profit: f64 = winning.iter().map(|t| t.pnl).sum();
    let gross_loss: f64 = losing.iter().map(|t| t.pnl.abs()).sum();
    let net_profit: f64 = trades.iter().map(|t| t.pnl).sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let avg_trade = if total_trades > 0 {
        net_profit / total_trades as f64
    } else {
        0.0
    };
    let largest_win = winning.iter().map(|t| t.pnl).fold(0.0f64, f64::max);
    let largest_loss = losing.iter().map(|t| t.pnl).fold(0.0f64, f64::min);

    // ── Returns ──
    let total_return_pct = (final_equity - initial_capital) / initial_capital * 100.0;

    // ── Drawdown ──
    let (max_drawdown_pct, max_drawdown_duration_bricks, avg_drawdown_pct) =
        calculate_drawdown_stats(equity_curve, initial_capital);

    // ── Consistency ──
    let (max_consecutive_wins, max_consecutive_losses) = calculate_consecutive(trades);

    PortfolioMetrics {
        final_equity,
        total_return_pct,
        max_drawdown_pct,
        max_drawdown_duration_bricks,
        avg_drawdown_pct,
        total_trades,
        winning_trades,
        losing_trades,
        win_rate_pct,
        gross_profit,
        gross_loss,
        net_profit,
        profit_factor,
        avg_trade,
        largest_win,
        largest_loss,
        max_consecutive_wins,
        max_consecutive_losses,
        stagnation_bricks: calculate_stagnation_bricks(equity_curve, initial_capital),
        ulcer_index_pct: calculate_ulcer_index(equity_curve, initial_capital),
        return_dd_ratio: if max_drawdown_pct > 0.0 {
            total_return_pct / max_drawdown_pct
        } else if total_return_pct > 0.0 {
            f64::INFINITY
        } else {
            0.0
        },
    }
}

/// Metrics for a run with no bricks.
pub fn empty_metrics(initial_capital: f64) -> PortfolioMetrics {
    PortfolioMetrics {
        final_equity: initial_capital,
        total_return_pct: 0.0,
        max_drawdown_pct: 0.0,
        max_drawdown_duration_bricks: 0,
        avg_drawdown_pct: 0.0,
        total_trades: 0,
        winning_trades: 0,
        losing_trades: 0,
        win_rate_pct: 0.0,
        gross_profit: 0.0,
        gross_loss: 0.0,
        net_profit: 0.0,
        profit_factor: 0.0,
        avg_trade: 0.0,
        largest_win: 0.0,
        largest_loss: 0.0,
        max_consecutive_wins: 0,
        max_consecutive_losses: 0,
        stagnation_bricks: 0,
        ulcer_index_pct: 0.0,
        return_dd_ratio: 0.0,
    }
}

/// Drawdown percent of `equity` below `peak`.
pub fn drawdown_pct(peak: f64, equity: f64) -> f64 {
    if peak > 0.0 && equity < peak {
        (peak - equity) / peak * 100.0
    } else {
        0.0
    }
}

/// Max drawdown %, its duration in bricks, and the average of nonzero drawdowns.
/// The running peak starts at `initial_capital`.
fn calculate_drawdown_stats(equity_curve: &[EquityPoint], initial_capital: f64) -> (f64, usize, f64) {
    let mut peak = initial_capital;
    // Position of the peak; -1 means the starting capital before the first brick.
    let mut peak_pos: isize = -1;
    let mut max_dd_pct = 0.0f64;
    let mut max_dd_duration = 0usize;
    let mut dd_sum = 0.0f64;
    let mut dd_count = 0usize;

    for (i, point) in equity_curve.iter().enumerate() {
        if point.equity > peak {
            peak = point.equity;
            peak_pos = i as isize;
        }

        let dd_pct = drawdown_pct(peak, point.equity);
        if dd_pct > max_dd_pct {
            max_dd_pct = dd_pct;
            max_dd_duration = (i as isize - peak_pos) as usize;
        }
        if dd_pct > 0.0 {
            dd_sum += dd_pct;
            dd_count += 1;
        }
    }

    let avg_dd = if dd_count > 0 {
        dd_sum / dd_count as f64
    } else {
        0.0
    };

    (max_dd_pct, max_dd_duration, avg_dd)
}

/// Longest consecutive winning and losing trade streaks. Breakeven trades break neither.
fn calculate_consecutive(trades: &[Trade]) -> (usize, usize) {
    let mut max_wins = 0usize;
    let mut max_losses = 0usize;
    let mut current_wins = 0usize;
    let mut current_losses = 0usize;

    for trade in trades {
        if trade.pnl > 0.0 {
            current_wins += 1;
            current_losses = 0;
        } else if trade.pnl < 0.0 {
            current_losses += 1;
            current_wins = 0;
        }
        max_wins = max_wins.max(current_wins);
        max_losses = max_losses.max(current_losses);
    }

    (max_wins, max_losses)
}

/// Longest run of bricks without a new equity high.
fn calculate_stagnation_bricks(equity_curve: &[EquityPoint], initial_capital: f64) -> usize {
    let mut peak = initial_capital;
    let mut current_stag = 0usize;
    let mut max_stag = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_stag = 0;
        } else {
            current_stag += 1;
            max_stag = max_stag.max(current_stag);
        }
    }
    max_stag
}

/// UI = sqrt(mean(drawdown_pct²)) with drawdown measured from the running peak.
fn calculate_ulcer_index(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let mut peak = initial_capital;
    let mut sum_sq = 0.0f64;

    for point in equity_curve {
        peak = peak.max(point.equity);
        let dd = drawdown_pct(peak, point.equity);
        sum_sq += dd * dd;
    }
    (sum_sq / equity_curve.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn make_trade(pnl: f64) -> Trade {
        Trade {
            entry_brick_index: 1,
            exit_brick_index: 2,
            entry_date: date(),
            exit_date: date(),
            entry_price: 100.0,
            exit_price: if pnl > 0.0 { 105.0 } else { 95.0 },
            quantity: 1.0,
            pnl,
            return_pct: pnl,
            duration_bricks: 1,
        }
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                brick_index: i + 1,
                date: date(),
                equity,
            })
            .collect()
    }

    #[test]
    fn test_empty_metrics() {
        let m = calculate_metrics(&[], &[], 10000.0, 10000.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.final_equity, 10000.0);
        assert_eq!(m.total_return_pct, 0.0);
    }

    #[test]
    fn test_basic_metrics() {
        let trades = vec![make_trade(500.0), make_trade(-200.0), make_trade(300.0)];
        let equity_curve = curve(&[10000.0, 10500.0, 10300.0, 10600.0]);
        let m = calculate_metrics(&trades, &equity_curve, 10000.0, 10600.0);
        assert_eq!(m.total_trades, 3);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 1);
        assert!((m.gross_profit - 800.0).abs() < 0.01);
        assert!((m.gross_loss - 200.0).abs() < 0.01);
        assert!((m.net_profit - 600.0).abs() < 0.01);
        assert!((m.profit_factor - 4.0).abs() < 0.01);
        assert!((m.win_rate_pct - 66.666).abs() < 0.01);
        assert!((m.total_return_pct - 6.0).abs() < 1e-9);
        assert_eq!(m.largest_win, 500.0);
        assert_eq!(m.largest_loss, -200.0);
    }

    #[test]
    fn test_consecutive_wins_losses() {
        let trades: Vec<Trade> = [100.0, 100.0, 100.0, -50.0, -50.0, 100.0]
            .iter()
            .map(|&p| make_trade(p))
            .collect();
        assert_eq!(calculate_consecutive(&trades), (3, 2));
    }

    #[test]
    fn test_drawdown_stats() {
        let c = curve(&[10000.0, 10500.0, 10000.0, 9500.0, 10200.0]);
        let (max_dd, duration, _) = calculate_drawdown_stats(&c, 10000.0);
        // Peak 10500, trough 9500
        assert!((max_dd - 1000.0 / 10500.0 * 100.0).abs() < 1e-9);
        assert_eq!(duration, 2);
    }

    #[test]
    fn test_drawdown_peak_starts_at_capital() {
        // Equity never exceeds the starting capital, so the first brick is already in drawdown.
        let c = curve(&[9000.0, 9500.0]);
        let (max_dd, duration, _) = calculate_drawdown_stats(&c, 10000.0);
        assert!((max_dd - 10.0).abs() < 1e-9);
        assert_eq!(duration, 1);
        assert_eq!(calculate_stagnation_bricks(&c, 10000.0), 2);
    }

    #[test]
    fn test_ulcer_index_flat_curve() {
        let c = curve(&[100.0, 100.0, 100.0]);
        assert_eq!(calculate_ulcer_index(&c, 100.0), 0.0);
        let m = calculate_metrics(&[], &c, 100.0, 100.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
        assert_eq!(m.return_dd_ratio, 0.0);
    }

    #[test]
    fn test_open_position_return_without_trades() {
        let c = curve(&[100.0, 120.0]);
        let m = calculate_metrics(&[], &c, 100.0, 120.0);
        assert_eq!(m.total_trades, 0);
        assert!((m.total_return_pct - 20.0).abs() < 1e-9);
        assert_eq!(m.net_profit, 0.0);
        assert!(m.return_dd_ratio.is_infinite());
    }
}
