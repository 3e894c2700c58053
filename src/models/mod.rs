pub mod bar;
pub mod brick;
pub mod config;
pub mod result;
pub mod signal;
pub mod trade;
