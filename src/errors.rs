use serde::Serialize;

/// All application errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Data ──
    #[error("Price series is empty")]
    EmptySeries,

    #[error("Malformed bar at index {index}: {message}")]
    MalformedBar { index: usize, message: String },

    #[error("Bars are not in ascending date order at index {index}")]
    UnorderedBars { index: usize },

    #[error("Insufficient data for indicator calculation: need {needed} bars, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Signals do not line up with bricks: {0}")]
    SignalMismatch(String),

    // ── Configuration ──
    #[error("Invalid brick size: {0}")]
    InvalidBrickSize(f64),

    #[error("Initial capital must be positive, got {0}")]
    InvalidCapital(f64),

    #[error("Invalid {name}: {value} (must be >= 1)")]
    InvalidTrendLength { name: &'static str, value: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Optimization ──
    #[error("No parameter combination completed ({skipped} skipped)")]
    NoValidCombinations { skipped: usize },

    #[error("Optimization cancelled")]
    OptimizationCancelled,

    // ── IO ──
    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ── General ──
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error class used to decide how a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Data,
    Config,
    Run,
    Io,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::EmptySeries
            | AppError::MalformedBar { .. }
            | AppError::UnorderedBars { .. }
            | AppError::InsufficientData { .. }
            | AppError::SignalMismatch(_) => ErrorCategory::Data,
            AppError::InvalidBrickSize(_)
            | AppError::InvalidCapital(_)
            | AppError::InvalidTrendLength { .. }
            | AppError::InvalidConfig(_) => ErrorCategory::Config,
            AppError::NoValidCombinations { .. }
            | AppError::OptimizationCancelled
            | AppError::Internal(_) => ErrorCategory::Run,
            AppError::FileRead(_) | AppError::FileWrite(_) | AppError::Serialization(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Data and configuration errors only invalidate a single pipeline run.
    /// The grid search records them and moves on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Data | ErrorCategory::Config)
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptySeries => "EMPTY_SERIES",
            AppError::MalformedBar { .. } => "MALFORMED_BAR",
            AppError::UnorderedBars { .. } => "UNORDERED_BARS",
            AppError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            AppError::SignalMismatch(_) => "SIGNAL_MISMATCH",
            AppError::InvalidBrickSize(_) => "INVALID_BRICK_SIZE",
            AppError::InvalidCapital(_) => "INVALID_CAPITAL",
            AppError::InvalidTrendLength { .. } => "INVALID_TREND_LENGTH",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::NoValidCombinations { .. } => "NO_VALID_COMBINATIONS",
            AppError::OptimizationCancelled => "OPTIMIZATION_CANCELLED",
            AppError::FileRead(_) => "FILE_READ",
            AppError::FileWrite(_) => "FILE_WRITE",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

/// Serializable error record handed to the reporting side.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileRead(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::FileWrite(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_categories() {
        assert!(AppError::EmptySeries.is_recoverable());
        assert!(AppError::InvalidBrickSize(0.0).is_recoverable());
        assert!(AppError::InsufficientData { needed: 10, available: 3 }.is_recoverable());
        assert!(!AppError::OptimizationCancelled.is_recoverable());
        assert!(!AppError::NoValidCombinations { skipped: 4 }.is_recoverable());
        assert!(!AppError::FileWrite("disk full".into()).is_recoverable());
    }

    #[test]
    fn test_error_serializes_as_code_and_message() {
        let err = AppError::InvalidCapital(-5.0);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_CAPITAL");
        assert_eq!(json["message"], "Initial capital must be positive, got -5");
    }
}
