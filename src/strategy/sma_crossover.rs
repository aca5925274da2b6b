use super::SignalGenerator;
use crate::error::BacktestError;
use crate::indicators::sma_series;
use crate::models::{Candle, Signal};

/// Long/flat moving-average crossover
///
/// A bar is Long while the fast SMA of closes sits above the slow SMA, Short
/// while it sits below, and Flat when they are equal or either average has
/// not filled its window yet.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast: usize,
    slow: usize,
    name: String,
}

/// Both averages and the derived signal, index-aligned with the input candles
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub sma_fast: Vec<Option<f64>>,
    pub sma_slow: Vec<Option<f64>>,
    pub signals: Vec<Signal>,
}

impl SmaCrossover {
    /// Windows must be positive. `fast < slow` is the sensible setup but is
    /// not enforced.
    pub fn new(fast: usize, slow: usize) -> Result<Self, BacktestError> {
        if fast == 0 {
            return Err(BacktestError::invalid("fast_window", "must be positive"));
        }
        if slow == 0 {
            return Err(BacktestError::invalid("slow_window", "must be positive"));
        }

        Ok(Self {
            fast,
            slow,
            name: format!("SMA Crossover ({}/{})", fast, slow),
        })
    }

    pub fn fast(&self) -> usize {
        self.fast
    }

    pub fn slow(&self) -> usize {
        self.slow
    }

    /// Compute both averages and the signal for every bar
    pub fn compute(&self, candles: &[Candle]) -> Result<SignalSeries, BacktestError> {
        if candles.is_empty() {
            return Err(BacktestError::invalid("candles", "series is empty"));
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let sma_fast = sma_series(&closes, self.fast);
        let sma_slow = sma_series(&closes, self.slow);

        let signals = sma_fast
            .iter()
            .zip(&sma_slow)
            .map(|(fast, slow)| crossover_signal(*fast, *slow))
            .collect();

        Ok(SignalSeries {
            sma_fast,
            sma_slow,
            signals,
        })
    }
}

fn crossover_signal(fast: Option<f64>, slow: Option<f64>) -> Signal {
    match (fast, slow) {
        (Some(f), Some(s)) if f > s => Signal::Long,
        (Some(f), Some(s)) if f < s => Signal::Short,
        _ => Signal::Flat,
    }
}

impl SignalGenerator for SmaCrossover {
    fn generate_signals(&self, candles: &[Candle]) -> Result<Vec<Signal>, BacktestError> {
        Ok(self.compute(candles)?.signals)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_candles_required(&self) -> usize {
        self.fast.max(self.slow)
    }
}
