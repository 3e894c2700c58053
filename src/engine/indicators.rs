use crate::errors::AppError;
use crate::models::bar::Bar;

/// ATR series for a bar slice. `None` until the trailing window is full.
pub fn compute_atr(bars: &[Bar], period: usize) -> Result<Vec<Option<f64>>, AppError> {
    if period == 0 {
        return Err(AppError::InvalidConfig("atr_period must be >= 1".into()));
    }
    check_data_len(bars.len(), period)?;

    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();

    Ok(atr(&high, &low, &close, period)
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect())
}

// ── Helpers ──

fn check_data_len(available: usize, needed: usize) -> Result<(), AppError> {
    if available == 0 {
        return Err(AppError::EmptySeries);
    }
    if available < needed {
        return Err(AppError::InsufficientData { needed, available });
    }
    Ok(())
}

// ── SMA ──

/// Simple Moving Average. First `period-1` values are NaN.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let len = data.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len < period {
        return result;
    }
    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = sum / period as f64;
    for i in period..len {
        sum += data[i] - data[i - period];
        result[i] = sum / period as f64;
    }
    result
}

// ── True Range ──

/// True range per bar. The first bar has no previous close, so it is `high - low`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let len = high.len();
    let mut tr = vec![0.0f64; len];
    if len == 0 {
        return tr;
    }

    tr[0] = high[0] - low[0];
    for i in 1..len {
        let hl = high[i] - low[i];
        let hc = (high[i] - close[i - 1]).abs();
        let lc = (low[i] - close[i - 1]).abs();
        tr[i] = hl.max(hc).max(lc);
    }
    tr
}

// ── ATR ──

/// Average True Range: simple mean of the trailing `period` true ranges.
/// First `period-1` values are NaN.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let tr = true_range(high, low, close);
    let mut result = sma(&tr, period);
    // Rolling sums drift by a few ulps; a flat window must read as exactly zero.
    for (i, v) in result.iter_mut().enumerate() {
        if i + 1 >= period && period > 0 && tr[i + 1 - period..=i].iter().all(|&t| t == 0.0) {
            *v = 0.0;
        }
    }
    result
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        if a.is_nan() && b.is_nan() {
            return true;
        }
        (a - b).abs() < epsilon
    }

    fn assert_approx(actual: f64, expected: f64, epsilon: f64, msg: &str) {
        assert!(
            approx_eq(actual, expected, epsilon),
            "{}: expected {}, got {}",
            msg,
            expected,
            actual
        );
    }

    fn bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = sma(&data, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 2.0, 1e-10, "SMA[2]");
        assert_approx(result[3], 3.0, 1e-10, "SMA[3]");
        assert_approx(result[9], 9.0, 1e-10, "SMA[9]");
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let high = vec![10.0, 12.0, 11.0];
        let low = vec![9.0, 11.5, 8.0];
        let close = vec![9.5, 11.8, 8.5];
        let tr = true_range(&high, &low, &close);
        assert_approx(tr[0], 1.0, 1e-12, "TR[0]");
        // gap up: high - prev close dominates
        assert_approx(tr[1], 2.5, 1e-12, "TR[1]");
        // gap down: prev close - low dominates
        assert_approx(tr[2], 3.8, 1e-12, "TR[2]");
    }

    #[test]
    fn test_atr_basic() {
        let high = vec![48.70, 48.72, 48.90, 48.87, 48.82];
        let low = vec![47.79, 48.14, 48.39, 48.37, 48.24];
        let close = vec![48.16, 48.61, 48.75, 48.63, 48.74];
        let result = atr(&high, &low, &close, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_finite(), "ATR[2] should be finite");
        assert!(result[2] > 0.0, "ATR should be positive");
        let tr = true_range(&high, &low, &close);
        assert_approx(result[4], (tr[2] + tr[3] + tr[4]) / 3.0, 1e-10, "ATR[4]");
    }

    #[test]
    fn test_atr_flat_window_is_zero() {
        let high = vec![5.0; 6];
        let low = vec![5.0; 6];
        let close = vec![5.0; 6];
        let result = atr(&high, &low, &close, 2);
        assert_eq!(result[5], 0.0);
    }

    #[test]
    fn test_compute_atr_absent_before_window() {
        let bars: Vec<Bar> = (1..=5)
            .map(|d| bar(d, 101.0 + d as f64, 99.0 + d as f64, 100.0 + d as f64))
            .collect();
        let atr = compute_atr(&bars, 3).unwrap();
        assert_eq!(atr.len(), 5);
        assert!(atr[0].is_none());
        assert!(atr[1].is_none());
        assert!(atr[2].is_some());
    }

    #[test]
    fn test_compute_atr_insufficient_data() {
        let bars: Vec<Bar> = (1..=2).map(|d| bar(d, 11.0, 9.0, 10.0)).collect();
        match compute_atr(&bars, 5).unwrap_err() {
            AppError::InsufficientData { needed, available } => {
                assert_eq!(needed, 5);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
        assert!(matches!(compute_atr(&[], 3), Err(AppError::EmptySeries)));
        assert!(compute_atr(&bars, 0).is_err());
    }
}
