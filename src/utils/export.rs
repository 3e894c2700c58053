use std::path::Path;

use crate::errors::AppError;
use crate::models::brick::Brick;
use crate::models::result::{
    DrawdownPoint, EquityPoint, OptimizationReport, OptimizationResult, PortfolioMetrics,
    RunResult, SkippedRun,
};
use crate::models::signal::Signal;
use crate::models::trade::Trade;

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create CSV {}: {}", path.display(), e)))
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the brick sequence to a CSV file.
pub fn write_bricks_csv(bricks: &[Brick], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    wtr.write_record([
        "Index", "Date", "Direction", "Open", "Close", "Size", "Source Bar",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for b in bricks {
        wtr.write_record([
            b.sequence_index.to_string(),
            b.date.to_string(),
            b.direction.as_str().to_string(),
            format!("{:.6}", b.open_price),
            format!("{:.6}", b.close_price),
            format!("{:.6}", b.size),
            b.source_bar_index.to_string(),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write signals next to the brick they were generated from.
pub fn write_signals_csv(bricks: &[Brick], signals: &[Signal], path: &Path) -> Result<(), AppError> {
    if bricks.len() != signals.len() {
        return Err(AppError::SignalMismatch(format!(
            "{} bricks but {} signals",
            bricks.len(),
            signals.len()
        )));
    }
    let mut wtr = create_writer(path)?;

    wtr.write_record(["Index", "Date", "Direction", "Close", "Signal"])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for (b, s) in bricks.iter().zip(signals) {
        wtr.write_record([
            s.brick_index.to_string(),
            b.date.to_string(),
            b.direction.as_str().to_string(),
            format!("{:.6}", b.close_price),
            s.action.as_str().to_string(),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write equity and drawdown per brick.
pub fn write_equity_csv(
    equity: &[EquityPoint],
    drawdown: &[DrawdownPoint],
    path: &Path,
) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    wtr.write_record(["Index", "Date", "Equity", "Drawdown %"])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for (i, p) in equity.iter().enumerate() {
        let dd = drawdown.get(i).map(|d| d.drawdown_pct).unwrap_or(0.0);
        wtr.write_record([
            &p.brick_index.to_string(),
            &p.date.to_string(),
            &format!("{:.2}", p.equity),
            &format!("{:.4}", dd),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write a list of trades to a CSV file.
pub fn write_trades_csv(trades: &[Trade], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    // Header
    wtr.write_record([
        "Entry Brick",
        "Entry Date",
        "Entry Price",
        "Exit Brick",
        "Exit Date",
        "Exit Price",
        "Quantity",
        "P&L",
        "Return %",
        "Bricks",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for t in trades {
        wtr.write_record([
            &t.entry_brick_index.to_string(),
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_brick_index.to_string(),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.return_pct),
            &t.duration_bricks.to_string(),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write run metrics as a key-value CSV report.
pub fn write_metrics_csv(metrics: &PortfolioMetrics, path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    wtr.write_record(["Metric", "Value"])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;

    let rows: Vec<(&str, String)> = vec![
        // Returns
        ("Final Equity", format!("{:.2}", metrics.final_equity)),
        ("Total Return %", format!("{:.2}", metrics.total_return_pct)),
        // Drawdown
        ("Max Drawdown %", format!("{:.2}", metrics.max_drawdown_pct)),
        ("Max DD Duration (bricks)", metrics.max_drawdown_duration_bricks.to_string()),
        ("Avg Drawdown %", format!("{:.2}", metrics.avg_drawdown_pct)),
        // Trades
        ("Total Trades", metrics.total_trades.to_string()),
        ("Winning Trades", metrics.winning_trades.to_string()),
        ("Losing Trades", metrics.losing_trades.to_string()),
        ("Win Rate %", format!("{:.2}", metrics.win_rate_pct)),
        // P&L
        ("Gross Profit", format!("{:.2}", metrics.gross_profit)),
        ("Gross Loss", format!("{:.2}", metrics.gross_loss)),
        ("Net Profit", format!("{:.2}", metrics.net_profit)),
        ("Profit Factor", format!("{:.2}", metrics.profit_factor)),
        ("Avg Trade", format!("{:.2}", metrics.avg_trade)),
        ("Largest Win", format!("{:.2}", metrics.largest_win)),
        ("Largest Loss", format!("{:.2}", metrics.largest_loss)),
        // Consistency
        ("Max Consecutive Wins", metrics.max_consecutive_wins.to_string()),
        ("Max Consecutive Losses", metrics.max_consecutive_losses.to_string()),
        // Stagnation & Ulcer
        ("Stagnation (bricks)", metrics.stagnation_bricks.to_string()),
        ("Ulcer Index %", format!("{:.2}", metrics.ulcer_index_pct)),
        ("Return/DD Ratio", format!("{:.2}", metrics.return_dd_ratio)),
    ];

    for (name, value) in &rows {
        wtr.write_record([*name, value.as_str()])
            .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write ranked optimization results, best first.
pub fn write_ranking_csv(results: &[OptimizationResult], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    wtr.write_record([
        "Rank",
        "Mode",
        "ATR Period",
        "ATR Multiplier",
        "Buy Trend",
        "Sell Trend",
        "Return %",
        "Max DD %",
        "Trades",
        "Bricks",
        "Brick Size",
        "Final Equity",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for (rank, r) in results.iter().enumerate() {
        wtr.write_record([
            (rank + 1).to_string(),
            r.params.mode.as_str().to_string(),
            optional(r.params.atr_period),
            optional(r.params.atr_multiplier),
            r.params.buy_trend_length.to_string(),
            r.params.sell_trend_length.to_string(),
            format!("{:.2}", r.total_return_pct),
            format!("{:.2}", r.max_drawdown_pct),
            r.trade_count.to_string(),
            r.brick_count.to_string(),
            format!("{:.6}", r.brick_size),
            format!("{:.2}", r.final_equity),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write grid cells that could not complete, with their error codes.
pub fn write_skipped_csv(skipped: &[SkippedRun], path: &Path) -> Result<(), AppError> {
    let mut wtr = create_writer(path)?;

    wtr.write_record([
        "Mode",
        "ATR Period",
        "ATR Multiplier",
        "Buy Trend",
        "Sell Trend",
        "Code",
        "Message",
    ])
    .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for s in skipped {
        wtr.write_record([
            s.params.mode.as_str().to_string(),
            optional(s.params.atr_period),
            optional(s.params.atr_multiplier),
            s.params.buy_trend_length.to_string(),
            s.params.sell_trend_length.to_string(),
            s.error.code.clone(),
            s.error.message.clone(),
        ])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write every table of a single run into `dir`.
pub fn export_run(run: &RunResult, dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::FileWrite(format!("{}: {}", dir.display(), e)))?;
    let portfolio = &run.portfolio;
    write_bricks_csv(&run.bricks, &dir.join("bricks.csv"))?;
    write_signals_csv(&run.bricks, &run.signals, &dir.join("signals.csv"))?;
    write_equity_csv(
        &portfolio.equity_curve,
        &portfolio.drawdown_curve,
        &dir.join("equity.csv"),
    )?;
    write_trades_csv(&portfolio.trades, &dir.join("trades.csv"))?;
    write_metrics_csv(&portfolio.metrics, &dir.join("metrics.csv"))?;
    Ok(())
}

/// Write the ranking, skipped cells, and the best run's tables into `dir`.
pub fn export_optimization(report: &OptimizationReport, dir: &Path) -> Result<(), AppError> {
    export_run(&report.best_run, &dir.join("best_run"))?;
    write_ranking_csv(&report.ranked, &dir.join("ranking.csv"))?;
    write_skipped_csv(&report.skipped, &dir.join("skipped.csv"))?;
    Ok(())
}
