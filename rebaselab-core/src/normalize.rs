//! Multi-symbol alignment and rebasing into one combined table.
//!
//! Alignment happens before rebasing: every column's baseline is its price on
//! the first row of the aligned index, so the first row is all zeros.
//!
//! - `Intersection` keeps only dates present in every series.
//! - `ForwardFill` keeps the union of dates from the latest first-date onward
//!   and carries each symbol's previous price across its gaps.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::{rebase, PriceSeries};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no series to combine")]
    NoColumns,

    #[error("series share no common dates")]
    EmptyIntersection,

    #[error("duplicate column label '{0}'")]
    DuplicateLabel(String),
}

/// How series with different trading calendars are put on one date index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignPolicy {
    #[default]
    Intersection,
    ForwardFill,
}

impl AlignPolicy {
    pub fn label(self) -> &'static str {
        match self {
            AlignPolicy::Intersection => "intersection",
            AlignPolicy::ForwardFill => "forward_fill",
        }
    }
}

/// One percent-change column of a [`CombinedTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    /// Display label (`S&P500` for the benchmark).
    pub label: String,
    /// Provider symbol (`^GSPC`).
    pub symbol: String,
    pub values: Vec<f64>,
}

/// Percent-change columns sharing one date index. No ragged rows, never empty.
///
/// Serialize only: a table is only ever built through [`CombinedTable::build`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedTable {
    dates: Vec<NaiveDate>,
    columns: Vec<TableColumn>,
}

impl CombinedTable {
    /// Align `(label, series)` pairs under `policy` and rebase each column.
    ///
    /// Column order follows the input order.
    pub fn build<'a, I>(inputs: I, policy: AlignPolicy) -> Result<Self, NormalizeError>
    where
        I: IntoIterator<Item = (&'a str, &'a PriceSeries)>,
    {
        let inputs: Vec<(&str, &PriceSeries)> = inputs.into_iter().collect();
        if inputs.is_empty() {
            return Err(NormalizeError::NoColumns);
        }

        let mut seen = HashSet::new();
        for (label, _) in &inputs {
            if !seen.insert(*label) {
                return Err(NormalizeError::DuplicateLabel(label.to_string()));
            }
        }

        let series: Vec<&PriceSeries> = inputs.iter().map(|(_, s)| *s).collect();
        let dates = match policy {
            AlignPolicy::Intersection => intersection_index(&series),
            AlignPolicy::ForwardFill => forward_fill_index(&series),
        };
        if dates.is_empty() {
            return Err(NormalizeError::EmptyIntersection);
        }

        let columns = inputs
            .iter()
            .map(|(label, s)| {
                let prices = match policy {
                    AlignPolicy::Intersection => exact_prices(s, &dates),
                    AlignPolicy::ForwardFill => carried_prices(s, &dates),
                };
                TableColumn {
                    label: label.to_string(),
                    symbol: s.symbol().to_string(),
                    values: rebase(&prices),
                }
            })
            .collect();

        Ok(Self { dates, columns })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.label.as_str())
    }

    pub fn column(&self, label: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.label == label)
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Values across all columns at row `i`, in column order.
    pub fn row(&self, i: usize) -> Option<(NaiveDate, Vec<f64>)> {
        let date = *self.dates.get(i)?;
        Some((date, self.columns.iter().map(|c| c.values[i]).collect()))
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Smallest and largest value over all columns.
    pub fn value_bounds(&self) -> (f64, f64) {
        self.columns
            .iter()
            .flat_map(|c| c.values.iter().copied())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Deterministic BLAKE3 hash over dates, labels and values.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for column in &self.columns {
            hasher.update(column.label.as_bytes());
            hasher.update(&[0]);
            for v in &column.values {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn intersection_index(series: &[&PriceSeries]) -> Vec<NaiveDate> {
    let others: Vec<HashSet<NaiveDate>> = series[1..].iter().map(|s| s.dates().collect()).collect();
    series[0]
        .dates()
        .filter(|d| others.iter().all(|set| set.contains(d)))
        .collect()
}

fn forward_fill_index(series: &[&PriceSeries]) -> Vec<NaiveDate> {
    let Some(start) = series.iter().map(|s| s.first().date).max() else {
        return Vec::new();
    };
    let union: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.dates())
        .filter(|d| *d >= start)
        .collect();
    union.into_iter().collect()
}

fn exact_prices(series: &PriceSeries, dates: &[NaiveDate]) -> Vec<f64> {
    let by_date: HashMap<NaiveDate, f64> = series.points().iter().map(|p| (p.date, p.price)).collect();
    dates.iter().filter_map(|d| by_date.get(d).copied()).collect()
}

/// Last known price on or before each date. `dates` must not start before the
/// series' first observation.
fn carried_prices(series: &PriceSeries, dates: &[NaiveDate]) -> Vec<f64> {
    let points = series.points();
    let mut out = Vec::with_capacity(dates.len());
    let mut next = 0;
    let mut last = points[0].price;
    for date in dates {
        while next < points.len() && points[next].date <= *date {
            last = points[next].price;
            next += 1;
        }
        out.push(last);
    }
    out
}
