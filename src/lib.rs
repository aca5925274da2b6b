// Core modules
pub mod api;
pub mod backtest;
pub mod error;
pub mod indicators;
pub mod models;
pub mod report;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{BacktestConfig, BacktestResult, BacktestRunner};
pub use error::BacktestError;
pub use models::*;
pub use strategy::{SignalGenerator, SmaCrossover};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
