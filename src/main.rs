use chrono::Utc;
use clap::Parser;
use smacross::api::BinanceClient;
use smacross::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use smacross::models::Candle;
use smacross::report;
use smacross::settings::Settings;
use smacross::Result;
use std::path::PathBuf;

/// Backtest an SMA crossover strategy on Binance klines
#[derive(Parser, Debug)]
#[command(name = "smacross")]
#[command(version)]
struct Cli {
    /// Trading pair, e.g. ETHUSDT
    symbol: Option<String>,

    /// Kline interval, e.g. 1h
    interval: Option<String>,

    /// Fast SMA window
    fast: Option<usize>,

    /// Slow SMA window
    slow: Option<usize>,

    /// Directory for the trade log and equity curve
    output_dir: Option<PathBuf>,

    /// Run timestamp used in output file names
    timestamp: Option<String>,

    /// Number of klines to fetch (max 1000)
    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    initial_cash: Option<f64>,

    /// Slippage as a fraction of price, e.g. 0.001
    #[arg(long)]
    slippage_pct: Option<f64>,

    /// Fee in basis points, e.g. 20 = 0.20%
    #[arg(long)]
    fee_bps: Option<f64>,

    /// Use generated candles instead of fetching from Binance
    #[arg(long, value_enum)]
    synthetic: Option<MarketScenario>,

    /// Seed for synthetic candles
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Settings file (defaults to ./smacross.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(symbol) = &self.symbol {
            settings.symbol = symbol.clone();
        }
        if let Some(interval) = &self.interval {
            settings.interval = interval.clone();
        }
        if let Some(fast) = self.fast {
            settings.fast_window = fast;
        }
        if let Some(slow) = self.slow {
            settings.slow_window = slow;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = Some(dir.clone());
        }
        if let Some(limit) = self.limit {
            settings.limit = limit;
        }
        if let Some(cash) = self.initial_cash {
            settings.initial_cash = cash;
        }
        if let Some(slippage) = self.slippage_pct {
            settings.slippage_pct = slippage;
        }
        if let Some(fee) = self.fee_bps {
            settings.fee_bps = fee;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);

    let config = settings.backtest_config();
    let runner = BacktestRunner::new(config.clone())?;

    let candles = load_candles(&cli, &settings).await?;
    if let (Some(first), Some(last)) = (candles.first(), candles.last()) {
        tracing::info!(
            "Loaded {} candles from {} to {}",
            candles.len(),
            first.timestamp,
            last.timestamp
        );
    }

    let result = runner.run(&candles)?;
    let metrics = BacktestMetrics::from_result(&result, config.initial_cash);
    metrics.print_report();

    // A directory without a timestamp still gets uniquely named files
    let timestamp = match (&settings.output_dir, &cli.timestamp) {
        (Some(_), None) => Some(Utc::now().format("%Y%m%d_%H%M%S").to_string()),
        (_, ts) => ts.clone(),
    };

    let paths = report::write_report(&result, settings.output_dir.as_deref(), timestamp.as_deref())?;
    println!("Saved {}", paths.equity.display());
    println!("Saved {}", paths.trades.display());

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("smacross=info")),
        )
        .init();
}

async fn load_candles(cli: &Cli, settings: &Settings) -> Result<Vec<Candle>> {
    if let Some(scenario) = cli.synthetic {
        tracing::info!("Generating {} synthetic {:?} candles (seed {})", settings.limit, scenario, cli.seed);
        let mut generator = SyntheticDataGenerator::new(cli.seed);
        return Ok(generator.generate(scenario, settings.limit as usize, 60));
    }

    let client = BinanceClient::new()?;
    let candles = client
        .fetch_klines(&settings.symbol, &settings.interval, settings.limit)
        .await?;
    Ok(candles)
}
