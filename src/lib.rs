pub mod engine;
pub mod errors;
pub mod models;
pub mod utils;

pub use engine::optimizer::optimize;
pub use engine::pipeline::run;
pub use engine::screening::{screen, ScreeningCriteria, ScreeningReport};
pub use errors::{AppError, ErrorCategory, ErrorResponse};
pub use models::bar::Bar;
pub use models::brick::{Brick, Direction};
pub use models::config::{
    OptimizationGrid, OptimizerSettings, RenkoConfig, RenkoMode, SizingMode, StrategyParams,
};
pub use models::result::{
    OptimizationParams, OptimizationReport, OptimizationResult, PortfolioResult, RunResult,
    SkippedRun,
};
pub use models::signal::{Signal, SignalAction};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Filter comes from `RUST_LOG`, default `info`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
