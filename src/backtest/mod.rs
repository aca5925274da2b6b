pub mod config;
pub mod metrics;
pub mod runner;
pub mod simulator;
pub mod synthetic;

pub use config::BacktestConfig;
pub use metrics::{BacktestMetrics, TradeRecord};
pub use runner::{BacktestResult, BacktestRunner};
pub use simulator::{forward_fill, BarOutcome, ExecutionSimulator, PositionState, Walk};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
