use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{self, AtomicBool};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::errors::{AppError, ErrorResponse};
use crate::models::bar::Bar;
use crate::models::config::{OptimizationGrid, OptimizerSettings, RenkoMode};
use crate::models::result::{
    OptimizationParams, OptimizationReport, OptimizationResult, RunResult, SkippedRun,
};

use super::indicators::compute_atr;
use super::pipeline;

type AtrCache = HashMap<usize, Result<Vec<Option<f64>>, AppError>>;

/// What happened to one grid cell.
enum CellOutcome {
    Completed(OptimizationResult),
    Skipped(SkippedRun),
    NotStarted,
}

// ══════════════════════════════════════════════════════════════
// Grid generation
// ══════════════════════════════════════════════════════════════

/// Every cell of the grid in canonical order: daily cells first, then ATR cells
/// lexicographic over (period, multiplier, buy, sell). Lists are sorted and
/// de-duplicated first, so input order never changes the result.
pub fn enumerate_combinations(grid: &OptimizationGrid) -> Vec<OptimizationParams> {
    let mut periods = grid.atr_periods.clone();
    periods.sort_unstable();
    periods.dedup();

    let mut multipliers = grid.atr_multipliers.clone();
    multipliers.sort_by(|a, b| a.total_cmp(b));
    multipliers.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);

    let mut lengths = grid.trend_lengths.clone();
    lengths.sort_unstable();
    lengths.dedup();

    let mut modes = grid.modes.clone();
    modes.sort();
    modes.dedup();

    let mut cells = Vec::new();
    for mode in modes {
        match mode {
            RenkoMode::Daily => {
                for &buy in &lengths {
                    for &sell in &lengths {
                        cells.push(OptimizationParams::daily(buy, sell));
                    }
                }
            }
            RenkoMode::Atr => {
                for &period in &periods {
                    for &multiplier in &multipliers {
                        for &buy in &lengths {
                            for &sell in &lengths {
                                cells.push(OptimizationParams::atr(period, multiplier, buy, sell));
                            }
                        }
                    }
                }
            }
        }
    }
    cells
}

// ══════════════════════════════════════════════════════════════
// Ranking
// ══════════════════════════════════════════════════════════════

/// Best first: highest return, then shallowest drawdown, then canonical parameter order.
pub fn rank_results(results: &mut [OptimizationResult]) {
    results.sort_by(compare_results);
}

fn compare_results(a: &OptimizationResult, b: &OptimizationResult) -> Ordering {
    b.total_return_pct
        .total_cmp(&a.total_return_pct)
        .then_with(|| a.max_drawdown_pct.total_cmp(&b.max_drawdown_pct))
        .then_with(|| a.params.canonical_cmp(&b.params))
}

fn summarize(params: OptimizationParams, run: &RunResult) -> OptimizationResult {
    let metrics = &run.portfolio.metrics;
    OptimizationResult {
        params,
        total_return_pct: metrics.total_return_pct,
        max_drawdown_pct: metrics.max_drawdown_pct,
        trade_count: run.portfolio.trades.len(),
        final_equity: run.portfolio.final_equity,
        brick_count: run.bricks.len(),
        brick_size: run.brick_size,
    }
}

// ══════════════════════════════════════════════════════════════
// Grid search
// ══════════════════════════════════════════════════════════════

/// Run the pipeline for every grid cell (up to `max_iterations`) on a bounded
/// worker pool and rank the results.
///
/// Cells that fail with a data or configuration error are reported as skipped.
/// The output does not depend on `max_threads`.
pub fn optimize(
    bars: &[Bar],
    grid: &OptimizationGrid,
    settings: &OptimizerSettings,
    cancel: Option<&AtomicBool>,
) -> Result<OptimizationReport, AppError> {
    grid.validate()?;
    settings.validate()?;

    let mut cells = enumerate_combinations(grid);
    let total_combinations = cells.len();
    if cells.len() > settings.max_iterations {
        info!(
            "Grid has {} combinations, evaluating the first {}",
            total_combinations, settings.max_iterations
        );
        cells.truncate(settings.max_iterations);
    }

    info!(
        "Grid search: {} combinations on {} threads",
        cells.len(),
        settings.max_threads
    );
    let start = Instant::now();

    let atr_cache = precompute_atr(bars, &cells);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.max_threads)
        .thread_name(|i| format!("renko-grid-{i}"))
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build worker pool: {}", e)))?;

    let outcomes: Vec<Result<CellOutcome, AppError>> = pool.install(|| {
        cells
            .par_iter()
            .map(|&params| {
                if cancel.is_some_and(|flag| flag.load(atomic::Ordering::Relaxed)) {
                    return Ok(CellOutcome::NotStarted);
                }
                evaluate_cell(bars, params, &atr_cache, settings.initial_capital)
            })
            .collect()
    });

    let evaluated = cells.len();
    let mut ranked: Vec<OptimizationResult> = Vec::new();
    let mut skipped: Vec<SkippedRun> = Vec::new();
    let mut cancelled = false;

    for outcome in outcomes {
        match outcome? {
            CellOutcome::Completed(result) => ranked.push(result),
            CellOutcome::Skipped(run) => {
                warn!(
                    "Skipped {}: {} ({})",
                    run.params.label(),
                    run.error.message,
                    run.error.code
                );
                skipped.push(run);
            }
            CellOutcome::NotStarted => cancelled = true,
        }
    }

    if cancelled {
        info!(
            "Grid search cancelled after {} of {} cells",
            ranked.len() + skipped.len(),
            evaluated
        );
        return Err(AppError::OptimizationCancelled);
    }

    rank_results(&mut ranked);

    info!(
        "Grid search complete: {} valid results, {} skipped in {:.1}s",
        ranked.len(),
        skipped.len(),
        start.elapsed().as_secs_f64()
    );

    let Some(best) = ranked.first() else {
        return Err(AppError::NoValidCombinations {
            skipped: skipped.len(),
        });
    };
    let best_run = run_cell(bars, best.params, &atr_cache, settings.initial_capital)?;

    Ok(OptimizationReport {
        ranked,
        skipped,
        total_combinations,
        evaluated,
        best_run,
    })
}

/// ATR series for each distinct period used by the cells, computed once and
/// shared read-only by the workers.
fn precompute_atr(bars: &[Bar], cells: &[OptimizationParams]) -> AtrCache {
    let mut cache = AtrCache::new();
    for period in cells.iter().filter_map(|c| c.atr_period) {
        cache
            .entry(period)
            .or_insert_with(|| compute_atr(bars, period));
    }
    cache
}

fn evaluate_cell(
    bars: &[Bar],
    params: OptimizationParams,
    atr_cache: &AtrCache,
    initial_capital: f64,
) -> Result<CellOutcome, AppError> {
    match run_cell(bars, params, atr_cache, initial_capital) {
        Ok(run) => Ok(CellOutcome::Completed(summarize(params, &run))),
        Err(e) if e.is_recoverable() => Ok(CellOutcome::Skipped(SkippedRun {
            params,
            error: ErrorResponse::from(&e),
        })),
        Err(e) => Err(e),
    }
}

fn run_cell(
    bars: &[Bar],
    params: OptimizationParams,
    atr_cache: &AtrCache,
    initial_capital: f64,
) -> Result<RunResult, AppError> {
    let strategy = params.strategy_params();
    let atr = match params.atr_period.and_then(|p| atr_cache.get(&p)) {
        Some(Ok(series)) => Some(series.as_slice()),
        Some(Err(e)) => return Err(clone_cached_error(e)),
        None => None,
    };
    pipeline::execute(bars, &strategy, atr, initial_capital)
}

/// Cached ATR failures are shared by many cells, so each cell gets its own copy.
fn clone_cached_error(err: &AppError) -> AppError {
    match err {
        AppError::EmptySeries => AppError::EmptySeries,
        AppError::MalformedBar { index, message } => AppError::MalformedBar {
            index: *index,
            message: message.clone(),
        },
        AppError::UnorderedBars { index } => AppError::UnorderedBars { index: *index },
        AppError::InsufficientData { needed, available } => AppError::InsufficientData {
            needed: *needed,
            available: *available,
        },
        AppError::InvalidConfig(msg) => AppError::InvalidConfig(msg.clone()),
        other => AppError::Internal(other.to_string()),
    }
}
