use crate::backtest::runner::BacktestResult;
use crate::models::{EquityPoint, Trade, TradeSide};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed buy/sell pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub cost_basis: f64,   // cash spent on entry, fee included
    pub net_proceeds: f64, // cash received on exit, fee deducted
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_period_minutes: i64,
    pub fees: f64,
}

impl TradeRecord {
    /// Pair a buy with the sell that closed it
    pub fn from_fills(buy: &Trade, sell: &Trade) -> Option<Self> {
        if buy.side != TradeSide::Buy || sell.side != TradeSide::Sell {
            return None;
        }

        let cost_basis = buy.price * buy.size + buy.fee;
        let net_proceeds = sell.price * sell.size - sell.fee;
        let pnl = net_proceeds - cost_basis;
        let pnl_pct = if cost_basis > 0.0 {
            (pnl / cost_basis) * 100.0
        } else {
            0.0
        };

        Some(Self {
            entry_time: buy.timestamp,
            exit_time: sell.timestamp,
            entry_price: buy.price,
            exit_price: sell.price,
            quantity: buy.size,
            cost_basis,
            net_proceeds,
            pnl,
            pnl_pct,
            holding_period_minutes: (sell.timestamp - buy.timestamp).num_minutes(),
            fees: buy.fee + sell.fee,
        })
    }
}

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L Metrics
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,

    // Fill Statistics
    pub total_fills: usize,
    pub buy_fills: usize,
    pub sell_fills: usize,
    pub total_fees: f64,
    pub open_at_end: bool,

    // Round Trips
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64, // Total wins / Total losses
    pub avg_holding_period_minutes: f64,

    // Risk Metrics (over the equity curve)
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    pub fn from_result(result: &BacktestResult, initial_portfolio_value: f64) -> Self {
        let final_portfolio_value = result.final_equity().unwrap_or(initial_portfolio_value);
        let total_pnl = final_portfolio_value - initial_portfolio_value;
        let total_return_pct = (total_pnl / initial_portfolio_value) * 100.0;

        let buy_fills = result
            .trades
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .count();
        let sell_fills = result.trades.len() - buy_fills;
        let total_fees: f64 = result.trades.iter().map(|t| t.fee).sum();

        let trades = Self::pair_round_trips(&result.trades);
        let round_trips = trades.len();

        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p <= 0.0).collect();

        let win_rate = if round_trips > 0 {
            (wins.len() as f64 / round_trips as f64) * 100.0
        } else {
            0.0
        };

        let total_wins: f64 = wins.iter().sum();
        let total_losses: f64 = losses.iter().map(|l| l.abs()).sum();

        let avg_win = if wins.is_empty() {
            0.0
        } else {
            total_wins / wins.len() as f64
        };
        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            total_losses / losses.len() as f64
        };

        let largest_win = wins.iter().copied().fold(0.0, f64::max);
        let largest_loss = losses.iter().copied().fold(0.0, f64::min);

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_holding_period_minutes = if round_trips > 0 {
            trades.iter().map(|t| t.holding_period_minutes).sum::<i64>() as f64
                / round_trips as f64
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(&result.equity, initial_portfolio_value);
        let sharpe_ratio = Self::calculate_sharpe_ratio(&result.equity, initial_portfolio_value);

        Self {
            total_pnl,
            total_return_pct,
            initial_portfolio_value,
            final_portfolio_value,
            total_fills: result.trades.len(),
            buy_fills,
            sell_fills,
            total_fees,
            open_at_end: result.final_state.is_long(),
            round_trips,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            avg_holding_period_minutes,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            trades,
        }
    }

    fn pair_round_trips(fills: &[Trade]) -> Vec<TradeRecord> {
        let mut records = Vec::new();
        let mut open_buy: Option<&Trade> = None;

        for fill in fills {
            match fill.side {
                TradeSide::Buy => open_buy = Some(fill),
                TradeSide::Sell => {
                    if let Some(buy) = open_buy.take() {
                        records.extend(TradeRecord::from_fills(buy, fill));
                    }
                }
            }
        }

        records
    }

    /// Maximum peak-to-trough decline of the equity curve
    fn calculate_drawdown(equity: &[EquityPoint], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for point in equity {
            if point.equity > peak {
                peak = point.equity;
            }

            let drawdown = peak - point.equity;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
            if peak > 0.0 {
                let pct = (drawdown / peak) * 100.0;
                if pct > max_dd_pct {
                    max_dd_pct = pct;
                }
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Per-bar Sharpe ratio, risk-free rate of 0, not annualised
    fn calculate_sharpe_ratio(equity: &[EquityPoint], initial_value: f64) -> f64 {
        let mut previous = initial_value;
        let mut returns = Vec::with_capacity(equity.len());
        for point in equity {
            if previous > 0.0 {
                returns.push(point.equity / previous - 1.0);
            }
            previous = point.equity;
        }

        if returns.is_empty() {
            return 0.0;
        }

        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|r| {
                let diff = r - mean_return;
                diff * diff
            })
            .sum::<f64>()
            / returns.len() as f64;

        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            mean_return / std_dev
        } else {
            0.0
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Cash:          ${:.2}", self.initial_portfolio_value);
        println!("  Final Equity:          ${:.2}", self.final_portfolio_value);
        println!(
            "  P&L:                   ${:.2} ({:+.2}%)",
            self.total_pnl, self.total_return_pct
        );
        println!("  Fees Paid:             ${:.2}", self.total_fees);

        println!("\n📈 TRADE STATISTICS");
        println!(
            "  Fills:                 {} ({} buy / {} sell)",
            self.total_fills, self.buy_fills, self.sell_fills
        );
        println!("  Round Trips:           {}", self.round_trips);
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing Trades:         {}", self.losing_trades);
        if self.open_at_end {
            println!("  Position still open at end of data");
        }

        if self.round_trips > 0 {
            println!("\n💰 WIN/LOSS ANALYSIS");
            println!("  Average Win:           ${:.2}", self.avg_win);
            println!("  Average Loss:          ${:.2}", self.avg_loss);
            println!("  Largest Win:           ${:.2}", self.largest_win);
            println!("  Largest Loss:          ${:.2}", self.largest_loss);
            println!("  Profit Factor:         {:.2}", self.profit_factor);
            println!(
                "  Avg Holding Period:    {:.1} hours",
                self.avg_holding_period_minutes / 60.0
            );
        }

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("  Sharpe Ratio (bar):    {:.3}", self.sharpe_ratio);

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::simulator::PositionState;
    use chrono::{Duration, TimeZone};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::hours(hours)
    }

    fn fill(hours: i64, side: TradeSide, price: f64, size: f64, fee: f64) -> Trade {
        Trade {
            timestamp: at(hours),
            side,
            price,
            size,
            fee,
        }
    }

    fn result_with(trades: Vec<Trade>, equity: &[f64], final_state: PositionState) -> BacktestResult {
        BacktestResult {
            trades,
            equity: equity
                .iter()
                .enumerate()
                .map(|(i, &equity)| EquityPoint {
                    timestamp: at(i as i64 + 1),
                    equity,
                })
                .collect(),
            signals: vec![],
            final_state,
        }
    }

    #[test]
    fn test_round_trip_pnl() {
        let buy = fill(1, TradeSide::Buy, 100.0, 9.9, 1.0);
        let sell = fill(5, TradeSide::Sell, 110.0, 9.9, 2.0);

        let record = TradeRecord::from_fills(&buy, &sell).unwrap();

        assert!((record.cost_basis - 991.0).abs() < 1e-9);
        assert!((record.net_proceeds - 1087.0).abs() < 1e-9);
        assert!((record.pnl - 96.0).abs() < 1e-9);
        assert_eq!(record.holding_period_minutes, 240);
        assert_eq!(record.fees, 3.0);
        assert!(TradeRecord::from_fills(&sell, &buy).is_none());
    }

    #[test]
    fn test_metrics_with_no_trades() {
        let result = result_with(
            vec![],
            &[1000.0, 1000.0, 1000.0],
            PositionState::new(1000.0),
        );
        let metrics = BacktestMetrics::from_result(&result, 1000.0);

        assert_eq!(metrics.total_fills, 0);
        assert_eq!(metrics.round_trips, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.total_pnl, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert!(!metrics.open_at_end);
    }

    #[test]
    fn test_open_position_not_counted_as_round_trip() {
        let trades = vec![
            fill(1, TradeSide::Buy, 100.0, 9.0, 1.0),
            fill(3, TradeSide::Sell, 90.0, 9.0, 1.0),
            fill(5, TradeSide::Buy, 95.0, 8.0, 1.0),
        ];
        let state = PositionState {
            cash: 0.0,
            quantity: 8.0,
            next_bar: 7,
        };
        let result = result_with(trades, &[900.0, 880.0, 810.0, 800.0, 760.0, 780.0], state);
        let metrics = BacktestMetrics::from_result(&result, 1000.0);

        assert_eq!(metrics.total_fills, 3);
        assert_eq!(metrics.buy_fills, 2);
        assert_eq!(metrics.sell_fills, 1);
        assert_eq!(metrics.round_trips, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert!(metrics.open_at_end);
        assert!((metrics.total_fees - 3.0).abs() < 1e-12);
        assert!((metrics.final_portfolio_value - 780.0).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_calculation() {
        let result = result_with(
            vec![],
            &[1100.0, 900.0, 950.0, 1200.0, 1150.0],
            PositionState::new(1000.0),
        );
        let metrics = BacktestMetrics::from_result(&result, 1000.0);

        // Peak at 1100, trough at 900
        assert!((metrics.max_drawdown - 200.0).abs() < 1e-9);
        assert!((metrics.max_drawdown_pct - 200.0 / 1100.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_profit_factor_calculation() {
        let trades = vec![
            fill(1, TradeSide::Buy, 100.0, 10.0, 0.0),
            fill(2, TradeSide::Sell, 120.0, 10.0, 0.0), // +200
            fill(3, TradeSide::Buy, 100.0, 12.0, 0.0),
            fill(4, TradeSide::Sell, 95.0, 12.0, 0.0), // -60
        ];
        let result = result_with(trades, &[1200.0, 1200.0, 1140.0, 1140.0], PositionState::new(1140.0));
        let metrics = BacktestMetrics::from_result(&result, 1000.0);

        assert_eq!(metrics.round_trips, 2);
        assert_eq!(metrics.winning_trades, 1);
        assert!((metrics.profit_factor - 200.0 / 60.0).abs() < 1e-9);
        assert!((metrics.largest_win - 200.0).abs() < 1e-9);
        assert!((metrics.largest_loss + 60.0).abs() < 1e-9);
        assert!((metrics.win_rate - 50.0).abs() < 1e-9);
    }
}
