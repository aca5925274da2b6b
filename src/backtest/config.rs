use crate::error::BacktestError;
use serde::{Deserialize, Serialize};

/// Parameters for a single SMA-crossover simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub initial_cash: f64,
    pub slippage_pct: f64, // fraction of price, e.g. 0.001 = 0.1%
    pub fee_bps: f64,      // basis points of traded value, e.g. 20 = 0.20%
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            fast_window: 20,
            slow_window: 50,
            initial_cash: 1000.0,
            slippage_pct: 0.001,
            fee_bps: 20.0,
        }
    }
}

impl BacktestConfig {
    /// Reject parameter combinations that would drive cash or quantity
    /// negative mid-walk.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.fast_window == 0 {
            return Err(BacktestError::invalid("fast_window", "must be positive"));
        }
        if self.slow_window == 0 {
            return Err(BacktestError::invalid("slow_window", "must be positive"));
        }
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(BacktestError::invalid(
                "initial_cash",
                format!("must be a positive amount, got {}", self.initial_cash),
            ));
        }
        if !(0.0..1.0).contains(&self.slippage_pct) {
            return Err(BacktestError::invalid(
                "slippage_pct",
                format!("must be in [0, 1), got {}", self.slippage_pct),
            ));
        }
        // 10000 bps consumes the whole fill
        if !(0.0..10_000.0).contains(&self.fee_bps) {
            return Err(BacktestError::invalid(
                "fee_bps",
                format!("must be in [0, 10000), got {}", self.fee_bps),
            ));
        }

        if self.fast_window >= self.slow_window {
            tracing::warn!(
                "fast window ({}) is not shorter than slow window ({})",
                self.fast_window,
                self.slow_window
            );
        }

        Ok(())
    }

    /// Fee rate as a fraction of traded value
    pub fn fee_rate(&self) -> f64 {
        self.fee_bps / 10_000.0
    }
}
