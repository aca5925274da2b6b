use crate::error::BacktestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Position intent derived from the moving-average relationship on a bar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Signal {
    Long,
    #[default]
    Flat,
    Short,
}

impl Signal {
    /// Numeric form: +1 / 0 / -1
    pub fn value(self) -> i8 {
        match self {
            Signal::Long => 1,
            Signal::Flat => 0,
            Signal::Short => -1,
        }
    }
}

/// Fill recorded by the simulator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Mark-to-market portfolio value after a bar has been processed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquityPoint {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Check the invariants every candle series must hold before it is simulated:
/// finite, non-negative prices and volume, and strictly increasing timestamps.
pub fn validate_candle_series(candles: &[Candle]) -> Result<(), BacktestError> {
    for (index, candle) in candles.iter().enumerate() {
        let fields = [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
            ("volume", candle.volume),
        ];

        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(BacktestError::InvalidCandle {
                    index,
                    reason: format!("{} = {}", name, value),
                });
            }
        }

        if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
            return Err(BacktestError::UnorderedCandles { index });
        }
    }

    Ok(())
}
