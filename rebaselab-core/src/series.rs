//! Price series and percent-change rebasing.
//!
//! A [`PriceSeries`] is the canonical per-symbol input: strictly increasing
//! dates, one price per date, every price finite and positive. It is built
//! either from raw provider bars (choosing the adjusted-close column, falling
//! back to close) or from cached points.
//!
//! Rebasing uses the direct ratio `(p[t] / p[0] - 1) * 100`. The first value
//! is pinned to exactly `0.0`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::provider::RawBar;

/// Errors building a price series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("neither adjusted close nor close prices available for '{symbol}'")]
    MissingPriceColumn { symbol: String },

    #[error("no usable price observations for '{symbol}'")]
    Empty { symbol: String },
}

/// Which provider column a series was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceColumn {
    AdjClose,
    Close,
}

impl PriceColumn {
    pub fn label(self) -> &'static str {
        match self {
            PriceColumn::AdjClose => "adj_close",
            PriceColumn::Close => "close",
        }
    }
}

/// One dated price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Ordered daily prices for one symbol. Never empty.
///
/// Serialize only: a series is only ever built through [`PriceSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    column: PriceColumn,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from arbitrary points.
    ///
    /// Points are sorted by date, the first occurrence of a duplicated date
    /// wins, and non-finite or non-positive prices are dropped.
    pub fn new(
        symbol: impl Into<String>,
        column: PriceColumn,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, SeriesError> {
        let symbol = symbol.into();

        points.retain(|p| p.price.is_finite() && p.price > 0.0);
        // Stable sort keeps the original order among equal dates, so dedup keeps the first.
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        if points.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }

        Ok(Self {
            symbol,
            column,
            points,
        })
    }

    /// Build a series from raw provider bars.
    ///
    /// The adjusted-close column is used when the response carries at least
    /// one adjusted value; otherwise the raw close column is used.
    pub fn from_raw_bars(symbol: impl Into<String>, bars: &[RawBar]) -> Result<Self, SeriesError> {
        let symbol = symbol.into();

        let has_adj = bars.iter().any(|b| usable(b.adj_close));
        let has_close = bars.iter().any(|b| usable(b.close));

        let column = match (has_adj, has_close) {
            (true, _) => PriceColumn::AdjClose,
            (false, true) => PriceColumn::Close,
            (false, false) => return Err(SeriesError::MissingPriceColumn { symbol }),
        };

        let points = bars
            .iter()
            .filter_map(|b| {
                let price = match column {
                    PriceColumn::AdjClose => b.adj_close,
                    PriceColumn::Close => b.close,
                }?;
                Some(PricePoint::new(b.date, price))
            })
            .collect();

        Self::new(symbol, column, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn column(&self) -> PriceColumn {
        self.column
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for the `len` / `is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> PricePoint {
        self.points[0]
    }

    pub fn last(&self) -> PricePoint {
        self.points[self.points.len() - 1]
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    /// Rebase this series to 0% at its first observation.
    pub fn percent_change(&self) -> PercentChangeSeries {
        PercentChangeSeries::from_prices(self)
    }
}

/// Percent change relative to the first observation of a [`PriceSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentChangeSeries {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl PercentChangeSeries {
    pub fn from_prices(series: &PriceSeries) -> Self {
        let prices: Vec<f64> = series.points.iter().map(|p| p.price).collect();
        Self {
            symbol: series.symbol.clone(),
            dates: series.dates().collect(),
            values: rebase(&prices),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last percent-change value, i.e. total change over the window.
    pub fn total_change(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Direct-ratio rebasing: `(p[t] / p[0] - 1) * 100`, with `t = 0` pinned to `0.0`.
pub fn rebase(prices: &[f64]) -> Vec<f64> {
    let Some(&base) = prices.first() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(prices.len());
    out.push(0.0);
    out.extend(prices[1..].iter().map(|p| (p / base - 1.0) * 100.0));
    out
}

fn usable(v: Option<f64>) -> bool {
    matches!(v, Some(p) if p.is_finite() && p > 0.0)
}
