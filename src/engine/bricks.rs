use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::bar::{validate_series, Bar};
use crate::models::brick::{Brick, Direction};
use crate::models::config::SizingMode;

use super::indicators::compute_atr;

/// Most bricks a single bar may emit. Larger moves are clipped to this many
/// bricks and the next bar measures from the last emitted close.
pub const MAX_BRICKS_PER_BAR: usize = 500;

/// Fraction of the full high-low range used as the derived daily brick size.
pub const DAILY_RANGE_FRACTION: f64 = 0.01;

/// Relative tolerance when comparing a pending move against the brick size.
const SIZE_TOLERANCE: f64 = 1e-9;

/// Build the brick sequence for `bars` under the given sizing mode.
pub fn build(bars: &[Bar], mode: &SizingMode) -> Result<Vec<Brick>, AppError> {
    validate_series(bars)?;
    mode.validate()?;

    match *mode {
        SizingMode::Daily { size } => {
            let size = match size {
                Some(explicit) => explicit,
                None => daily_brick_size(bars),
            };
            if size == 0.0 {
                debug!("Price range is flat, no bricks to build");
                return Ok(Vec::new());
            }
            if !size.is_finite() || size < 0.0 {
                return Err(AppError::InvalidBrickSize(size));
            }
            Ok(emit_bricks(bars, |_| Some(size)))
        }
        SizingMode::Atr { period, multiplier } => {
            let atr = compute_atr(bars, period)?;
            Ok(emit_bricks(bars, |i| atr[i].map(|a| a * multiplier)))
        }
    }
}

/// ATR-mode build over a precomputed ATR series (one entry per bar).
pub fn build_with_atr(
    bars: &[Bar],
    atr: &[Option<f64>],
    multiplier: f64,
) -> Result<Vec<Brick>, AppError> {
    validate_series(bars)?;
    if atr.len() != bars.len() {
        return Err(AppError::Internal(format!(
            "ATR series has {} values for {} bars",
            atr.len(),
            bars.len()
        )));
    }
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(AppError::InvalidConfig(format!(
            "atr_multiplier must be positive, got {}",
            multiplier
        )));
    }
    Ok(emit_bricks(bars, |i| atr[i].map(|a| a * multiplier)))
}

/// Daily-mode size derived from the whole series: 1% of the high-low range.
pub fn daily_brick_size(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let highest = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    (highest - lowest) * DAILY_RANGE_FRACTION
}

/// Core emission loop. `size_at(i)` gives the brick size in force at bar `i`,
/// or `None` while it is undefined. Non-positive sizes emit nothing.
fn emit_bricks(bars: &[Bar], size_at: impl Fn(usize) -> Option<f64>) -> Vec<Brick> {
    let mut bricks: Vec<Brick> = Vec::new();
    let Some(first) = bars.first() else {
        return bricks;
    };
    let mut reference = first.close;

    for (i, bar) in bars.iter().enumerate().skip(1) {
        let size = match size_at(i) {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => continue,
        };

        let mut pending = bar.close - reference;
        let mut emitted = 0usize;

        while pending.abs() >= size * (1.0 - SIZE_TOLERANCE) {
            if emitted == MAX_BRICKS_PER_BAR {
                warn!(
                    "Bar {} ({}) clipped at {} bricks, {:.4} of the move not bricked",
                    i,
                    bar.date,
                    MAX_BRICKS_PER_BAR,
                    pending.abs()
                );
                break;
            }

            let direction = if pending > 0.0 {
                Direction::Up
            } else {
                Direction::Down
            };
            let step = direction.sign() * size;
            let close_price = reference + step;

            bricks.push(Brick {
                sequence_index: bricks.len() + 1,
                direction,
                open_price: reference,
                close_price,
                size,
                source_bar_index: i,
                date: bar.date,
            });

            reference = close_price;
            pending -= step;
            emitted += 1;
        }
    }

    bricks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + Duration::days(i as i64),
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    fn fixed(size: f64) -> SizingMode {
        SizingMode::Daily { size: Some(size) }
    }

    #[test]
    fn test_rising_series_unit_bricks() {
        let bars = bars_from_closes(&[100.0, 101.0, 102.0, 103.0]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        assert_eq!(bricks.len(), 3);
        for (i, b) in bricks.iter().enumerate() {
            assert_eq!(b.sequence_index, i + 1);
            assert_eq!(b.direction, Direction::Up);
            assert_eq!(b.source_bar_index, i + 1);
            assert!((b.close_price - b.open_price - 1.0).abs() < 1e-12);
        }
        assert_eq!(bricks[2].close_price, 103.0);
    }

    #[test]
    fn test_multiple_bricks_from_one_bar() {
        let bars = bars_from_closes(&[100.0, 104.5]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        assert_eq!(bricks.len(), 4);
        assert!(bricks.iter().all(|b| b.source_bar_index == 1));
        assert_eq!(bricks[3].close_price, 104.0);
    }

    #[test]
    fn test_small_moves_accumulate() {
        // Each bar moves less than a brick; the reference does not move until one forms.
        let bars = bars_from_closes(&[100.0, 100.4, 100.8, 101.2]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        assert_eq!(bricks.len(), 1);
        assert_eq!(bricks[0].source_bar_index, 3);
        assert_eq!(bricks[0].close_price, 101.0);
    }

    #[test]
    fn test_reversal_needs_one_full_size() {
        let bars = bars_from_closes(&[100.0, 102.0, 101.5, 101.0]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        // Two up bricks to 102, the 0.5 dip does nothing, the drop to 101 reverses.
        assert_eq!(bricks.len(), 3);
        assert_eq!(bricks[0].direction, Direction::Up);
        assert_eq!(bricks[1].direction, Direction::Up);
        assert_eq!(bricks[2].direction, Direction::Down);
        assert_eq!(bricks[2].open_price, 102.0);
        assert_eq!(bricks[2].close_price, 101.0);
        assert_eq!(bricks[2].source_bar_index, 3);
    }

    #[test]
    fn test_brick_shape_invariant() {
        let bars = bars_from_closes(&[50.0, 53.3, 49.1, 49.9, 55.7, 52.0]);
        let bricks = build(&bars, &fixed(0.7)).unwrap();
        assert!(!bricks.is_empty());
        for pair in bricks.windows(2) {
            assert_eq!(pair[1].open_price, pair[0].close_price);
        }
        for b in &bricks {
            let delta = b.close_price - b.open_price;
            assert!((delta - b.direction.sign() * b.size).abs() < 1e-9);
        }
    }

    #[test]
    fn test_flat_series_has_no_bricks() {
        let bars = bars_from_closes(&[10.0; 30]);
        assert!(build(&bars, &fixed(0.5)).unwrap().is_empty());

        let atr_mode = SizingMode::Atr {
            period: 5,
            multiplier: 1.0,
        };
        let mut flat = bars.clone();
        for b in &mut flat {
            b.high = b.close;
            b.low = b.close;
        }
        assert!(build(&flat, &atr_mode).unwrap().is_empty());
        assert!(build(&flat, &SizingMode::Daily { size: None })
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_positive_size_is_config_error() {
        let bars = bars_from_closes(&[10.0, 11.0]);
        assert!(matches!(
            build(&bars, &fixed(0.0)),
            Err(AppError::InvalidBrickSize(_))
        ));
        assert!(matches!(
            build(&bars, &fixed(-1.0)),
            Err(AppError::InvalidBrickSize(_))
        ));
    }

    #[test]
    fn test_daily_size_derived_from_range() {
        let bars = bars_from_closes(&[100.0, 150.0, 120.0]);
        // high max 150.5, low min 99.5
        let size = daily_brick_size(&bars);
        assert!((size - 0.51).abs() < 1e-12);
        let bricks = build(&bars, &SizingMode::Daily { size: None }).unwrap();
        assert!(bricks.iter().all(|b| (b.size - size).abs() < 1e-12));
    }

    #[test]
    fn test_atr_mode_waits_for_window() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 2.0).collect();
        let bars = bars_from_closes(&closes);
        let mode = SizingMode::Atr {
            period: 5,
            multiplier: 1.0,
        };
        let bricks = build(&bars, &mode).unwrap();
        assert!(!bricks.is_empty());
        assert!(bricks.iter().all(|b| b.source_bar_index >= 4));
    }

    #[test]
    fn test_atr_mode_insufficient_history() {
        let bars = bars_from_closes(&[100.0, 101.0, 102.0]);
        let mode = SizingMode::Atr {
            period: 10,
            multiplier: 1.0,
        };
        assert!(matches!(
            build(&bars, &mode),
            Err(AppError::InsufficientData {
                needed: 10,
                available: 3
            })
        ));
    }

    #[test]
    fn test_atr_sizes_frozen_per_brick() {
        // Volatility expands halfway through; early bricks keep their smaller size.
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.extend((1..15).map(|i| 114.0 + i as f64 * 6.0));
        let bars = bars_from_closes(&closes);
        let mode = SizingMode::Atr {
            period: 3,
            multiplier: 1.0,
        };
        let bricks = build(&bars, &mode).unwrap();
        let first = bricks.first().unwrap().size;
        let last = bricks.last().unwrap().size;
        assert!(last > first);
        for b in &bricks {
            let delta = b.close_price - b.open_price;
            assert!((delta.abs() - b.size).abs() < 1e-9);
        }
    }

    #[test]
    fn test_atr_mode_is_deterministic() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 8.0 + i as f64 * 0.1)
            .collect();
        let bars = bars_from_closes(&closes);
        let mode = SizingMode::Atr {
            period: 4,
            multiplier: 0.5,
        };
        assert_eq!(build(&bars, &mode).unwrap(), build(&bars, &mode).unwrap());
    }

    #[test]
    fn test_build_with_atr_matches_build() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.3).cos() * 5.0).collect();
        let bars = bars_from_closes(&closes);
        let atr = compute_atr(&bars, 6).unwrap();
        let direct = build(
            &bars,
            &SizingMode::Atr {
                period: 6,
                multiplier: 0.8,
            },
        )
        .unwrap();
        assert_eq!(build_with_atr(&bars, &atr, 0.8).unwrap(), direct);
        assert!(build_with_atr(&bars, &atr[1..], 0.8).is_err());
    }

    #[test]
    fn test_brick_cap_clips_extreme_bar() {
        let bars = bars_from_closes(&[1.0, 2_000.0]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        assert_eq!(bricks.len(), MAX_BRICKS_PER_BAR);
        assert_eq!(bricks.last().unwrap().close_price, 1.0 + MAX_BRICKS_PER_BAR as f64);
    }

    #[test]
    fn test_brick_cap_resumes_on_next_bar() {
        let bars = bars_from_closes(&[1.0, 2_000.0, 2_000.0]);
        let bricks = build(&bars, &fixed(1.0)).unwrap();
        assert_eq!(bricks.len(), 2 * MAX_BRICKS_PER_BAR);
        assert!(bricks[MAX_BRICKS_PER_BAR..]
            .iter()
            .all(|b| b.source_bar_index == 2));
    }
}
