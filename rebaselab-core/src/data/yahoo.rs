//! Yahoo Finance price provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API. Handles retries with
//! exponential backoff, response parsing, exchange-local dating and the
//! circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::Deserialize;

use super::calendar::{in_window, local_date};
use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i32>,
    #[serde(rename = "exchangeTimezoneName")]
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Retry and timeout settings for [`YahooProvider`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            policy,
        })
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// Chart API URL for a symbol and local-date window `[start, end)`.
    ///
    /// The query is padded by a day on both sides so exchanges east or west of
    /// UTC are fully covered; the window itself is applied after local dating.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start
            .checked_sub_days(Days::new(1))
            .unwrap_or(start)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let period2 = end
            .checked_add_days(Days::new(1))
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{CHART_BASE}/{}?period1={period1}&period2={period2}&interval=1d&includeAdjustedClose=true",
            encode_symbol(symbol)
        )
    }

    /// Parse a chart response into bars dated in the exchange's local calendar.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let Some(result) = resp.chart.result else {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                },
                Some(err) => DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code,
                    err.description.unwrap_or_default()
                )),
                None => DataError::ResponseFormatChanged("empty result with no error".into()),
            });
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.as_ref().and_then(|m| m.gmtoffset);
        if let Some(tz) = data.meta.as_ref().and_then(|m| m.exchange_timezone_name.as_deref()) {
            tracing::debug!(symbol, tz, offset, "exchange timezone");
        }

        // No timestamps means no trading days in the window.
        let Some(timestamps) = data.timestamp else {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = local_date(ts, offset).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            if !in_window(date, start, end) {
                continue;
            }

            let bar = RawBar {
                date,
                open: at(&quote.open, i),
                high: at(&quote.high, i),
                low: at(&quote.low, i),
                close: at(&quote.close, i),
                volume: quote.volume.get(i).copied().flatten(),
                adj_close: adj_closes.as_deref().and_then(|v| at(v, i)),
            };

            // Holidays and halted sessions come back as all-null rows
            if bar.is_void() {
                continue;
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    /// One HTTP round trip, classified into a [`DataError`] on failure.
    fn attempt(
        &self,
        url: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                DataError::NetworkUnreachable(e.to_string())
            } else {
                DataError::ResponseFormatChanged(e.to_string())
            }
        })?;

        let status = resp.status();
        match status.as_u16() {
            200..=299 => {}
            401 => {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ))
            }
            403 => {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitOpen);
            }
            404 => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            429 => {
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(DataError::RateLimited { retry_after_secs });
            }
            code if status.is_server_error() => return Err(DataError::ServerError { status: code }),
            _ => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "HTTP {status} for {symbol}"
                )))
            }
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        Self::parse_response(symbol, chart, start, end)
    }

    /// Fetch with bounded exponential backoff on retryable failures.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        tracing::debug!(symbol, %url, "requesting chart");
        with_retry(&self.circuit_breaker, &self.policy, symbol, || {
            self.attempt(&url, symbol, start, end)
        })
    }
}

/// Run `op` until it succeeds, fails permanently, or exhausts the retry budget.
///
/// The breaker gates the first attempt only and counts one failure per symbol
/// once retries are spent. The error returned is the last real one.
fn with_retry<T>(
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    symbol: &str,
    mut op: impl FnMut() -> Result<T, DataError>,
) -> Result<T, DataError> {
    if !breaker.is_allowed() {
        return Err(DataError::CircuitOpen);
    }

    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(symbol, attempt, ?delay, error = %e, "retrying fetch");
                std::thread::sleep(delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    breaker.record_failure();
                }
                return Err(e);
            }
        }
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, start, end)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Yahoo,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Percent-encode a ticker for use as a URL path segment (`^GSPC` -> `%5EGSPC`).
fn encode_symbol(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for b in symbol.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'=') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
