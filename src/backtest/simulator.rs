use crate::backtest::config::BacktestConfig;
use crate::error::BacktestError;
use crate::models::{Candle, EquityPoint, Signal, Trade, TradeSide};
use serde::{Deserialize, Serialize};

/// Cash/quantity accumulator carried from bar to bar.
///
/// Either all cash or all quantity: entries spend the whole balance and exits
/// sell the whole holding. `next_bar` is the index of the next candle to
/// process, so a walk can be stopped and resumed at any bar boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub cash: f64,
    pub quantity: f64,
    pub next_bar: usize,
}

impl PositionState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            quantity: 0.0,
            // Bar 0 has no previous signal, trading starts at bar 1
            next_bar: 1,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    /// Mark-to-market value at `price`
    pub fn equity(&self, price: f64) -> f64 {
        self.quantity * price + self.cash
    }
}

/// Everything a single bar produced
#[derive(Debug, Clone, PartialEq)]
pub struct BarOutcome {
    pub trades: Vec<Trade>,
    pub equity: EquityPoint,
}

/// Trades and equity produced by walking a range of bars
#[derive(Debug, Clone, PartialEq)]
pub struct Walk {
    pub state: PositionState,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

/// Long/flat fill engine with next-bar-open execution, percentage slippage
/// and basis-point fees.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    initial_cash: f64,
    slippage_pct: f64,
    fee_rate: f64,
}

impl ExecutionSimulator {
    pub fn new(config: &BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;

        Ok(Self {
            initial_cash: config.initial_cash,
            slippage_pct: config.slippage_pct,
            fee_rate: config.fee_rate(),
        })
    }

    pub fn initial_state(&self) -> PositionState {
        PositionState::new(self.initial_cash)
    }

    /// Process one bar.
    ///
    /// The decision uses the signals of the previous and current bar; the
    /// fill happens at the current bar's open. Entry is checked before exit
    /// and the exit check sees the post-entry state.
    pub fn step(
        &self,
        mut state: PositionState,
        prev: Signal,
        cur: Signal,
        candle: &Candle,
    ) -> (PositionState, BarOutcome) {
        let mut trades = Vec::new();

        if prev.value() <= 0 && cur == Signal::Long && !state.is_long() {
            if let Some(trade) = self.enter(&mut state, candle) {
                trades.push(trade);
            }
        }

        if prev.value() >= 0 && cur == Signal::Short && state.is_long() {
            trades.push(self.exit(&mut state, candle));
        }

        state.next_bar += 1;

        let outcome = BarOutcome {
            trades,
            equity: EquityPoint {
                timestamp: candle.timestamp,
                equity: state.equity(candle.close),
            },
        };

        (state, outcome)
    }

    /// Spend all cash. The fee is taken out of the acquired quantity.
    fn enter(&self, state: &mut PositionState, candle: &Candle) -> Option<Trade> {
        let fill_price = candle.open * (1.0 + self.slippage_pct);
        if fill_price <= 0.0 {
            tracing::warn!(
                "Skipping entry at {}: non-positive fill price {}",
                candle.timestamp,
                fill_price
            );
            return None;
        }
        if state.cash <= 0.0 {
            tracing::warn!(
                "Skipping entry at {}: no cash left ({})",
                candle.timestamp,
                state.cash
            );
            return None;
        }

        let raw_size = state.cash / fill_price;
        let fee = fill_price * raw_size * self.fee_rate;
        let quantity = raw_size - fee / fill_price;

        state.quantity = quantity;
        state.cash = 0.0;

        tracing::debug!(
            "BUY {:.6} @ {:.4} (fee {:.4}) at {}",
            quantity,
            fill_price,
            fee,
            candle.timestamp
        );

        Some(Trade {
            timestamp: candle.timestamp,
            side: TradeSide::Buy,
            price: fill_price,
            size: quantity,
            fee,
        })
    }

    /// Sell the whole holding. The fee is taken out of the cash proceeds.
    fn exit(&self, state: &mut PositionState, candle: &Candle) -> Trade {
        let fill_price = candle.open * (1.0 - self.slippage_pct);
        let size = state.quantity;
        let proceeds = size * fill_price;
        let fee = proceeds * self.fee_rate;

        state.cash = proceeds - fee;
        state.quantity = 0.0;

        tracing::debug!(
            "SELL {:.6} @ {:.4} (fee {:.4}) at {}",
            size,
            fill_price,
            fee,
            candle.timestamp
        );

        Trade {
            timestamp: candle.timestamp,
            side: TradeSide::Sell,
            price: fill_price,
            size,
            fee,
        }
    }

    /// Walk every tradable bar from a fresh state
    pub fn walk(&self, candles: &[Candle], signals: &[Signal]) -> Walk {
        self.resume(self.initial_state(), candles, signals, candles.len())
    }

    /// Continue a walk from `state` up to (not including) bar `end`.
    ///
    /// `candles` and `signals` must be index-aligned; bars past the shorter
    /// of the two are ignored.
    pub fn resume(
        &self,
        state: PositionState,
        candles: &[Candle],
        signals: &[Signal],
        end: usize,
    ) -> Walk {
        let end = end.min(candles.len()).min(signals.len());
        let start = state.next_bar.max(1);

        let mut walk = Walk {
            state: PositionState {
                next_bar: start,
                ..state
            },
            trades: Vec::new(),
            equity: Vec::with_capacity(end.saturating_sub(start)),
        };

        for i in start..end {
            let (next, outcome) =
                self.step(walk.state, signals[i - 1], signals[i], &candles[i]);
            walk.state = next;
            walk.trades.extend(outcome.trades);
            walk.equity.push(outcome.equity);
        }

        walk
    }
}

/// Replace non-finite equity values with the last valid one before them.
/// Leading invalid values take `seed`.
pub fn forward_fill(points: &mut [EquityPoint], seed: f64) {
    let mut last_valid = seed;
    for point in points.iter_mut() {
        if point.equity.is_finite() {
            last_valid = point.equity;
        } else {
            point.equity = last_valid;
        }
    }
}
