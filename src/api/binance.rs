use crate::models::Candle;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const RATE_LIMIT_RPM: u32 = 600; // klines weigh 2 against a 1200/min budget
const MAX_RETRIES: u32 = 3;
const MAX_KLINES_LIMIT: u32 = 1000;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot klines client with rate limiting and retries
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
    backoff_base: Duration,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_API_BASE)
    }

    /// Point the client at another host (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let rpm = NonZeroU32::new(RATE_LIMIT_RPM).ok_or_else(|| anyhow!("rate limit must be non-zero"))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Base delay for exponential backoff between retries
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Make a rate-limited API request with retry logic
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            // Wait for rate limiter
            self.rate_limiter.until_ready().await;

            let backoff = self.backoff_base * 2u32.pow(attempt - 1);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            "Binance returned {}, retrying in {:?} (attempt {}/{})",
                            status,
                            backoff,
                            attempt,
                            MAX_RETRIES
                        );
                        if attempt < MAX_RETRIES {
                            tokio::time::sleep(backoff).await;
                        }
                        continue;
                    }

                    // Other errors (4xx) - don't retry
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("Binance API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!(
                        "Network error: {}, retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => anyhow::bail!("Network error after {} retries: {}", MAX_RETRIES, e),
            }
        }

        anyhow::bail!("Failed after {} retries", MAX_RETRIES)
    }

    /// Fetch the most recent `limit` klines for `symbol` at `interval`
    /// (e.g. "1h"), oldest first.
    pub async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES_LIMIT);
        let limit_param = limit.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/v3/klines", self.base_url),
            &[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit_param.as_str()),
            ],
        )
        .with_context(|| format!("Invalid Binance base URL: {}", self.base_url))?;

        tracing::debug!("Fetching {} {} klines for {}", limit, interval, symbol);

        let response = self.make_request(url.as_str()).await?;
        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .context("Failed to parse klines response")?;

        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_kline(row).with_context(|| format!("Malformed kline at row {}", i)))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Fetched {} {} candles for {}", candles.len(), interval, symbol);

        Ok(candles)
    }
}

/// Convert one kline row into a candle, timestamped at its open time.
///
/// Layout: `[openTime, open, high, low, close, volume, closeTime, ...]`,
/// with prices and volume sent as decimal strings.
pub fn parse_kline(row: &[Value]) -> Result<Candle> {
    if row.len() < 6 {
        anyhow::bail!("expected at least 6 fields, got {}", row.len());
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| anyhow!("open time is not an integer: {}", row[0]))?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time_ms)
        .ok_or_else(|| anyhow!("open time out of range: {}", open_time_ms))?;

    Ok(Candle {
        timestamp,
        open: parse_number(&row[1], "open")?,
        high: parse_number(&row[2], "high")?,
        low: parse_number(&row[3], "low")?,
        close: parse_number(&row[4], "close")?,
        volume: parse_number(&row[5], "volume")?,
    })
}

fn parse_number(value: &Value, field: &str) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("{} is not a number: {:?}", field, s)),
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("{} is not a number: {}", field, n)),
        other => Err(anyhow!("{} has unexpected type: {}", field, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const KLINES_BODY: &str = r#"[
        [1700000000000, "100.5", "101.0", "99.5", "100.8", "1234.5", 1700003599999, "0", 10, "0", "0", "0"],
        [1700003600000, "100.8", "102.2", "100.1", "101.9", "987.0", 1700007199999, "0", 12, "0", "0", "0"]
    ]"#;

    #[test]
    fn test_parse_kline() {
        let row = json!([1700000000000i64, "100.5", "101.0", "99.5", "100.8", "1234.5", 1700003599999i64]);
        let candle = parse_kline(row.as_array().unwrap()).unwrap();

        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candle.open, 100.5);
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.low, 99.5);
        assert_eq!(candle.close, 100.8);
        assert_eq!(candle.volume, 1234.5);
    }

    #[test]
    fn test_parse_kline_rejects_bad_rows() {
        let short = json!([1700000000000i64, "1", "2"]);
        assert!(parse_kline(short.as_array().unwrap()).is_err());

        let bad_price = json!([1700000000000i64, "abc", "1", "1", "1", "1"]);
        let err = parse_kline(bad_price.as_array().unwrap()).unwrap_err();
        assert!(err.to_string().contains("open"));

        let bad_time = json!(["yesterday", "1", "1", "1", "1", "1"]);
        assert!(parse_kline(bad_time.as_array().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_fetch_klines() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1h".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(KLINES_BODY)
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url()).unwrap();
        let candles = client.fetch_klines("ETHUSDT", "1h", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert!(candles[1].timestamp > candles[0].timestamp);
        assert_eq!(candles[1].close, 101.9);
    }

    #[tokio::test]
    async fn test_fetch_klines_encodes_query_values() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETH USDT&limit=5".into()),
                Matcher::UrlEncoded("interval".into(), "1h".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(KLINES_BODY)
            .expect(1)
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url()).unwrap();
        let candles = client.fetch_klines("ETH USDT&limit=5", "1h", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .expect(1)
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url()).unwrap();
        let result = client.fetch_klines("NOPE", "1h", 10).await;

        mock.assert_async().await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("400"), "{}", err);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = BinanceClient::with_base_url(server.url())
            .unwrap()
            .with_backoff_base(Duration::from_millis(1));
        let result = client.fetch_klines("ETHUSDT", "1h", 10).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_klines_live() {
        let client = BinanceClient::new().unwrap();
        let candles = client.fetch_klines("ETHUSDT", "1h", 100).await.unwrap();

        assert_eq!(candles.len(), 100);
        assert!(crate::models::validate_candle_series(&candles).is_ok());
    }
}
