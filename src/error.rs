use thiserror::Error;

/// Errors raised by the signal generator and execution simulator.
///
/// All of these are reported before the walk starts, so a failed run never
/// leaves a partial trade log or equity curve behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("insufficient data: need at least {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("candle {index} is not strictly after the previous candle")]
    UnorderedCandles { index: usize },

    #[error("candle {index} is invalid: {reason}")]
    InvalidCandle { index: usize, reason: String },
}

impl BacktestError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
