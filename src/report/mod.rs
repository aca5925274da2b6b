//! CSV sink for the trade log and equity curve.

use crate::backtest::BacktestResult;
use crate::models::{EquityPoint, Trade};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where a run's files go
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub trades: PathBuf,
    pub equity: PathBuf,
}

impl ReportPaths {
    /// `trades_{ts}.csv` / `equity_{ts}.csv` inside `output_dir` when both a
    /// directory and a run timestamp are given, otherwise `trades.csv` /
    /// `equity.csv` in the working directory.
    pub fn resolve(output_dir: Option<&Path>, timestamp: Option<&str>) -> Self {
        match (output_dir, timestamp) {
            (Some(dir), Some(ts)) => Self {
                trades: dir.join(format!("trades_{}.csv", ts)),
                equity: dir.join(format!("equity_{}.csv", ts)),
            },
            _ => Self {
                trades: PathBuf::from("trades.csv"),
                equity: PathBuf::from("equity.csv"),
            },
        }
    }
}

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(["time", "side", "price", "size", "fee"])?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;

    Ok(())
}

pub fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(["time", "equity"])?;
    for point in equity {
        writer.serialize(point)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write both files for a finished run
pub fn write_report(
    result: &BacktestResult,
    output_dir: Option<&Path>,
    timestamp: Option<&str>,
) -> Result<ReportPaths> {
    let paths = ReportPaths::resolve(output_dir, timestamp);

    if let Some(parent) = paths.trades.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    write_equity_csv(&paths.equity, &result.equity)?;
    tracing::info!("Saved {}", paths.equity.display());

    write_trades_csv(&paths.trades, &result.trades)?;
    tracing::info!("Saved {}", paths.trades.display());

    Ok(paths)
}
