use crate::backtest::config::BacktestConfig;
use crate::backtest::simulator::{forward_fill, ExecutionSimulator, PositionState};
use crate::error::BacktestError;
use crate::models::{validate_candle_series, Candle, EquityPoint, Signal, Trade};
use crate::strategy::{SignalGenerator, SmaCrossover};

/// Minimum bars for a single signal transition to be evaluated
const MIN_CANDLES: usize = 2;

/// Output of one simulation
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// One point per bar from index 1 to n-1, forward-filled
    pub equity: Vec<EquityPoint>,
    pub signals: Vec<Signal>,
    pub final_state: PositionState,
}

impl BacktestResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity.last().map(|p| p.equity)
    }
}

/// Backtest runner that simulates trading with historical data
pub struct BacktestRunner {
    config: BacktestConfig,
    simulator: ExecutionSimulator,
}

impl BacktestRunner {
    /// Create a new backtest runner. Fails if the configuration is invalid.
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        let simulator = ExecutionSimulator::new(&config)?;
        Ok(Self { config, simulator })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the SMA crossover configured by the fast/slow windows
    pub fn run(&self, candles: &[Candle]) -> Result<BacktestResult, BacktestError> {
        let strategy = SmaCrossover::new(self.config.fast_window, self.config.slow_window)?;
        self.run_with(&strategy, candles)
    }

    /// Run a backtest with the given signal rule
    ///
    /// # Arguments
    /// * `strategy` - Produces one signal per candle
    /// * `candles` - Historical candle data, oldest first
    ///
    /// # Returns
    /// Trade log and equity curve. Nothing is returned on error.
    pub fn run_with<S: SignalGenerator>(
        &self,
        strategy: &S,
        candles: &[Candle],
    ) -> Result<BacktestResult, BacktestError> {
        if candles.len() < MIN_CANDLES {
            return Err(BacktestError::InsufficientData {
                needed: MIN_CANDLES,
                got: candles.len(),
            });
        }
        validate_candle_series(candles)?;

        let signals = strategy.generate_signals(candles)?;
        if signals.len() != candles.len() {
            return Err(BacktestError::invalid(
                "signals",
                format!(
                    "{} produced {} signals for {} candles",
                    strategy.name(),
                    signals.len(),
                    candles.len()
                ),
            ));
        }

        if candles.len() < strategy.min_candles_required() {
            tracing::info!(
                "{} candles is shorter than the {} needed by {}; signal stays flat",
                candles.len(),
                strategy.min_candles_required(),
                strategy.name()
            );
        }

        tracing::info!(
            "Starting backtest: {} candles, strategy {}",
            candles.len(),
            strategy.name()
        );

        let mut walk = self.simulator.walk(candles, &signals);
        forward_fill(&mut walk.equity, self.config.initial_cash);

        let result = BacktestResult {
            trades: walk.trades,
            equity: walk.equity,
            signals,
            final_state: walk.state,
        };

        tracing::info!(
            "Backtest complete: {} trades, final equity ${:.2}",
            result.trades.len(),
            result.final_equity().unwrap_or(self.config.initial_cash)
        );

        Ok(result)
    }
}
