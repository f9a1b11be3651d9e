//! Combined-table export: CSV for download, JSON for scripting.
//!
//! CSV layout: header `Date,<label>...`, one row per index date, values with
//! six decimals.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rebaselab_core::CombinedTable;
use serde::Serialize;

use crate::session::{Dashboard, Provenance};

/// Default export file name.
pub const DEFAULT_EXPORT_FILE: &str = "percent_change_10yr.csv";

/// Render the table as CSV.
pub fn table_to_csv(table: &CombinedTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["Date".to_string()];
    header.extend(table.labels().map(str::to_string));
    wtr.write_record(&header)?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(table.column_count() + 1);
        record.push(date.format("%Y-%m-%d").to_string());
        record.extend(table.columns().iter().map(|c| format!("{:.6}", c.values[i])));
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Write the table as CSV to `path`, creating parent directories.
pub fn write_table_csv(table: &CombinedTable, path: &Path) -> Result<()> {
    let csv = table_to_csv(table)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.row_count(), "exported table");
    Ok(())
}

#[derive(Serialize)]
struct DashboardJson<'a> {
    start: NaiveDate,
    end: NaiveDate,
    align: &'static str,
    content_hash: String,
    provenance: &'a [Provenance],
    excluded: Vec<ExcludedJson>,
    table: &'a CombinedTable,
}

#[derive(Serialize)]
struct ExcludedJson {
    symbol: String,
    reason: String,
}

/// Pretty JSON for a dashboard: window, provenance, exclusions and the table.
pub fn dashboard_to_json(dashboard: &Dashboard) -> Result<String> {
    let doc = DashboardJson {
        start: dashboard.start,
        end: dashboard.end,
        align: dashboard.align.label(),
        content_hash: dashboard.table.content_hash(),
        provenance: &dashboard.provenance,
        excluded: dashboard
            .excluded
            .iter()
            .map(|e| ExcludedJson {
                symbol: e.symbol.clone(),
                reason: e.error.to_string(),
            })
            .collect(),
        table: &dashboard.table,
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize dashboard to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebaselab_core::{AlignPolicy, PriceColumn, PricePoint, PriceSeries};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn table() -> CombinedTable {
        let aapl = PriceSeries::new(
            "AAPL",
            PriceColumn::AdjClose,
            vec![PricePoint::new(d(2), 100.0), PricePoint::new(d(3), 101.5)],
        )
        .unwrap();
        let spx = PriceSeries::new(
            "^GSPC",
            PriceColumn::AdjClose,
            vec![PricePoint::new(d(2), 4000.0), PricePoint::new(d(3), 3960.0)],
        )
        .unwrap();
        CombinedTable::build([("AAPL", &aapl), ("S&P500", &spx)], AlignPolicy::Intersection).unwrap()
    }

    #[test]
    fn csv_layout() {
        let csv = table_to_csv(&table()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,AAPL,S&P500");
        assert_eq!(lines[1], "2024-01-02,0.000000,0.000000");
        assert_eq!(lines[2], "2024-01-03,1.500000,-1.000000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_EXPORT_FILE);
        write_table_csv(&table(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Date,AAPL,S&P500"));
    }
}
