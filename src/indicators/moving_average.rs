/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Rolling SMA aligned with `prices`: element `i` is the mean of the
/// `period` prices ending at `i`, or `None` until the window has filled.
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; prices.len()];
    }

    let mut sum = 0.0;
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| {
            sum += price;
            if i >= period {
                sum -= prices[i - period];
            }
            (i + 1 >= period).then(|| sum / period as f64)
        })
        .collect()
}
