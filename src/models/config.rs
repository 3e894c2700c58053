use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;

/// Brick sizing mode as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenkoMode {
    Daily,
    Atr,
}

impl RenkoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenkoMode::Daily => "daily",
            RenkoMode::Atr => "atr",
        }
    }
}

impl std::fmt::Display for RenkoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenkoMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RenkoMode::Daily),
            "atr" => Ok(RenkoMode::Atr),
            _ => Err(AppError::InvalidConfig(format!("Unknown renko mode: {}", s))),
        }
    }
}

/// How brick height is determined for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SizingMode {
    /// One size for the whole run. `None` derives it from the price range of the bars.
    Daily { size: Option<f64> },
    /// Size follows `ATR(period) * multiplier`, re-evaluated on every bar.
    Atr { period: usize, multiplier: f64 },
}

impl SizingMode {
    pub fn mode(&self) -> RenkoMode {
        match self {
            SizingMode::Daily { .. } => RenkoMode::Daily,
            SizingMode::Atr { .. } => RenkoMode::Atr,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match *self {
            SizingMode::Daily { size: Some(size) } => {
                if !size.is_finite() || size <= 0.0 {
                    return Err(AppError::InvalidBrickSize(size));
                }
            }
            SizingMode::Daily { size: None } => {}
            SizingMode::Atr { period, multiplier } => {
                if period == 0 {
                    return Err(AppError::InvalidConfig("atr_period must be >= 1".into()));
                }
                if !multiplier.is_finite() || multiplier <= 0.0 {
                    return Err(AppError::InvalidConfig(format!(
                        "atr_multiplier must be positive, got {}",
                        multiplier
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Everything one pipeline run needs besides bars and capital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub sizing: SizingMode,
    pub buy_trend_length: usize,
    pub sell_trend_length: usize,
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), AppError> {
        self.sizing.validate()?;
        validate_trend_length("buy_trend_length", self.buy_trend_length)?;
        validate_trend_length("sell_trend_length", self.sell_trend_length)?;
        Ok(())
    }
}

pub(crate) fn validate_trend_length(name: &'static str, value: usize) -> Result<(), AppError> {
    if value == 0 {
        return Err(AppError::InvalidTrendLength { name, value });
    }
    Ok(())
}

pub(crate) fn validate_capital(initial_capital: f64) -> Result<(), AppError> {
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(AppError::InvalidCapital(initial_capital));
    }
    Ok(())
}

/// Parameter space searched by the grid optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationGrid {
    pub modes: Vec<RenkoMode>,
    pub atr_periods: Vec<usize>,
    pub atr_multipliers: Vec<f64>,
    pub trend_lengths: Vec<usize>,
}

impl OptimizationGrid {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.modes.is_empty() {
            return Err(AppError::InvalidConfig("mode space is empty".into()));
        }
        if self.trend_lengths.is_empty() {
            return Err(AppError::InvalidConfig("trend_lengths is empty".into()));
        }
        for &len in &self.trend_lengths {
            validate_trend_length("trend_length", len)?;
        }
        if self.modes.contains(&RenkoMode::Atr) {
            if self.atr_periods.is_empty() {
                return Err(AppError::InvalidConfig("atr_periods is empty".into()));
            }
            if self.atr_multipliers.is_empty() {
                return Err(AppError::InvalidConfig("atr_multipliers is empty".into()));
            }
        }
        if self.atr_periods.contains(&0) {
            return Err(AppError::InvalidConfig("atr_periods must be >= 1".into()));
        }
        if let Some(m) = self
            .atr_multipliers
            .iter()
            .find(|m| !m.is_finite() || **m <= 0.0)
        {
            return Err(AppError::InvalidConfig(format!(
                "atr_multipliers must be positive, got {}",
                m
            )));
        }
        Ok(())
    }
}

/// Execution settings for the grid optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub initial_capital: f64,
    pub max_iterations: usize,
    pub max_threads: usize,
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_capital(self.initial_capital)?;
        if self.max_iterations == 0 {
            return Err(AppError::InvalidConfig("max_iterations must be >= 1".into()));
        }
        if self.max_threads == 0 {
            return Err(AppError::InvalidConfig("max_threads must be >= 1".into()));
        }
        Ok(())
    }
}

/// Full configuration surface, loadable from JSON.
///
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenkoConfig {
    pub renko_mode: RenkoMode,
    /// Explicit brick size for daily mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brick_size: Option<f64>,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub buy_trend_length: usize,
    pub sell_trend_length: usize,
    pub initial_capital: f64,
    pub max_iterations: usize,
    pub max_threads: usize,
    pub optimize_modes: Vec<RenkoMode>,
    pub atr_periods: Vec<usize>,
    pub atr_multipliers: Vec<f64>,
    pub trend_lengths: Vec<usize>,
    /// Look-back window (in bar dates) for recent-signal screening.
    pub recent_signal_days: usize,
    pub target_return_pct: f64,
}

impl Default for RenkoConfig {
    fn default() -> Self {
        Self {
            renko_mode: RenkoMode::Atr,
            brick_size: None,
            atr_period: 10,
            atr_multiplier: 0.5,
            buy_trend_length: 3,
            sell_trend_length: 3,
            initial_capital: 1_000_000.0,
            max_iterations: 10_000,
            max_threads: 1,
            optimize_modes: vec![RenkoMode::Daily, RenkoMode::Atr],
            atr_periods: vec![3, 5, 10, 15],
            atr_multipliers: vec![0.3, 0.5, 1.0, 2.0],
            trend_lengths: vec![2, 3, 5],
            recent_signal_days: 3,
            target_return_pct: 15.0,
        }
    }
}

/// Upper bound for `recent_signal_days`.
pub const MAX_RECENT_SIGNAL_DAYS: usize = 5;

impl RenkoConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let config: RenkoConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AppError::FileRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Load the config at `path`, writing the defaults there first if the file is missing.
    pub fn load_or_create(path: &Path) -> Result<Self, AppError> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::FileWrite(format!("{}: {}", parent.display(), e)))?;
        }
        config.save(path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| AppError::FileWrite(format!("{}: {}", path.display(), e)))
    }

    /// Reject out-of-range values instead of coercing them.
    pub fn validate(&self) -> Result<(), AppError> {
        self.single_run_params().validate()?;
        // ATR settings must be valid whichever mode is selected.
        SizingMode::Atr {
            period: self.atr_period,
            multiplier: self.atr_multiplier,
        }
        .validate()?;
        if let Some(size) = self.brick_size {
            SizingMode::Daily { size: Some(size) }.validate()?;
        }
        self.optimizer_settings().validate()?;
        self.grid().validate()?;
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

    pub fn sizing_mode(&self) -> SizingMode {
        match self.renko_mode {
            RenkoMode::Daily => SizingMode::Daily {
                size: self.brick_size,
            },
            RenkoMode::Atr => SizingMode::Atr {
                period: self.atr_period,
                multiplier: self.atr_multiplier,
            },
        }
    }

    pub fn single_run_params(&self) -> StrategyParams {
        StrategyParams {
            sizing: self.sizing_mode(),
            buy_trend_length: self.buy_trend_length,
            sell_trend_length: self.sell_trend_length,
        }
    }

    pub fn grid(&self) -> OptimizationGrid {
        OptimizationGrid {
            modes: self.optimize_modes.clone(),
            atr_periods: self.atr_periods.clone(),
            atr_multipliers: self.atr_multipliers.clone(),
            trend_lengths: self.trend_lengths.clone(),
        }
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            initial_capital: self.initial_capital,
            max_iterations: self.max_iterations,
            max_threads: self.max_threads,
        }
    }
}
