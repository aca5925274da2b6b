// Trading strategy module
pub mod sma_crossover;

pub use sma_crossover::{SignalSeries, SmaCrossover};

use crate::error::BacktestError;
use crate::models::{Candle, Signal};

/// Base trait for per-bar signal rules driving the simulator
pub trait SignalGenerator: Send + Sync {
    /// Generate one signal per candle, aligned by index
    fn generate_signals(&self, candles: &[Candle]) -> Result<Vec<Signal>, BacktestError>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Candles needed before the rule can produce anything other than Flat
    fn min_candles_required(&self) -> usize;
}
