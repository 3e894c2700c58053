pub mod bricks;
pub mod indicators;
pub mod metrics;
pub mod optimizer;
pub mod pipeline;
pub mod position;
pub mod screening;
pub mod signals;
pub mod simulator;
