use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Sideways/choppy market (mean-reverting)
    Sideways,
    /// High volatility (±5% swings)
    Volatile,
    /// Rally over the first half, decline over the second
    Crossover,
}

/// Generates synthetic price data for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
            // 2024-01-01T00:00:00Z, fixed so seeded runs are identical
            start_time: DateTime::<Utc>::UNIX_EPOCH + Duration::days(19_723),
        }
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of candles to generate
    /// * `interval_minutes` - Minutes between candles
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;

        for i in 0..num_candles {
            let timestamp = self.start_time + Duration::minutes(i as i64 * interval_minutes);
            let open = current_price;
            current_price = self.next_price(scenario, current_price, i, num_candles);

            let candle = self.create_candle(open, current_price, timestamp);
            candles.push(candle);
        }

        candles
    }

    fn next_price(
        &mut self,
        scenario: MarketScenario,
        price: f64,
        index: usize,
        num_candles: usize,
    ) -> f64 {
        let next = match scenario {
            MarketScenario::Uptrend => {
                let drift = price * 0.002;
                let noise = price * self.rng.gen_range(-0.001..0.001);
                price + drift + noise
            }
            MarketScenario::Downtrend => {
                let drift = price * -0.002;
                let noise = price * self.rng.gen_range(-0.001..0.001);
                price + drift + noise
            }
            MarketScenario::Sideways => {
                // 10% pull back toward the base price plus ±1% noise
                let reversion = (self.base_price - price) * 0.1;
                let noise = price * self.rng.gen_range(-0.01..0.01);
                price + reversion + noise
            }
            MarketScenario::Volatile => {
                let change = price * self.rng.gen_range(-0.05..0.05);
                price + change
            }
            MarketScenario::Crossover => {
                let drift = if index < num_candles / 2 { 0.003 } else { -0.003 };
                let noise = price * self.rng.gen_range(-0.0005..0.0005);
                price + price * drift + noise
            }
        };

        // Prevent price from going too low
        next.max(self.base_price * 0.5)
    }

    /// Build a candle whose high/low bracket both open and close
    fn create_candle(&mut self, open: f64, close: f64, timestamp: DateTime<Utc>) -> Candle {
        let noise_pct = 0.002; // ±0.2% intrabar movement

        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..noise_pct));

        // Vary volume ±30%
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validate_candle_series;

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Uptrend, 500, 60);

        assert_eq!(candles.len(), 500);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;

        assert!(
            last_price > first_price,
            "Uptrend should end higher: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Downtrend, 200, 60);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;

        assert!(
            last_price < first_price,
            "Downtrend should end lower: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_sideways() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Sideways, 500, 60);

        let base = gen.base_price;
        for candle in &candles {
            assert!(
                candle.close > base * 0.9 && candle.close < base * 1.1,
                "Sideways should stay near base: {} vs {}",
                candle.close,
                base
            );
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(9).generate(MarketScenario::Volatile, 50, 60);
        let b = SyntheticDataGenerator::new(9).generate(MarketScenario::Volatile, 50, 60);
        assert_eq!(a, b);
    }

    #[test]
    fn test_series_passes_validation() {
        let mut gen = SyntheticDataGenerator::new(42);
        for scenario in [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
            MarketScenario::Crossover,
        ] {
            let candles = gen.generate(scenario, 100, 60);
            assert!(validate_candle_series(&candles).is_ok(), "{:?}", scenario);
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        let mut gen = SyntheticDataGenerator::new(42);
        let candles = gen.generate(MarketScenario::Volatile, 100, 60);

        for candle in &candles {
            assert!(candle.high >= candle.close, "High should be >= close");
            assert!(candle.high >= candle.open, "High should be >= open");
            assert!(candle.low <= candle.close, "Low should be <= close");
            assert!(candle.low <= candle.open, "Low should be <= open");
        }
    }
}
