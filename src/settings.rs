//! Application settings: built-in defaults, then an optional TOML file, then
//! `SMACROSS_*` environment variables.

use crate::backtest::BacktestConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "smacross";
const ENV_PREFIX: &str = "SMACROSS";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub symbol: String,
    pub interval: String,
    pub limit: u32,
    pub output_dir: Option<PathBuf>,

    pub fast_window: usize,
    pub slow_window: usize,
    pub initial_cash: f64,
    pub slippage_pct: f64,
    pub fee_bps: f64,
}

impl Settings {
    /// Load settings, reading `path` if given or `smacross.toml` in the
    /// working directory if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = BacktestConfig::default();

        let mut builder = Config::builder()
            .set_default("symbol", "ETHUSDT")?
            .set_default("interval", "1h")?
            .set_default("limit", 1000_i64)?
            .set_default("fast_window", defaults.fast_window as i64)?
            .set_default("slow_window", defaults.slow_window as i64)?
            .set_default("initial_cash", defaults.initial_cash)?
            .set_default("slippage_pct", defaults.slippage_pct)?
            .set_default("fee_bps", defaults.fee_bps)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            fast_window: self.fast_window,
            slow_window: self.slow_window,
            initial_cash: self.initial_cash,
            slippage_pct: self.slippage_pct,
            fee_bps: self.fee_bps,
        }
    }
}
