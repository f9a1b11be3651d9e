//! Flat per-symbol CSV cache.
//!
//! Layout: `{cache_dir}/{SYMBOL}_{start}_{end}.csv`, one file per literal
//! `(symbol, start, end)` request. Columns: `date,adj_close,pct_change`, or
//! `date,close,pct_change` when the provider had no adjusted close.
//!
//! - On-disk presence of the key's file is a cache hit
//! - Atomic writes (write `.csv.tmp`, rename into place)
//! - Validation on load; corrupt files are quarantined (`.csv.quarantined`)
//! - Entries are never mutated; a forced refresh replaces the whole file

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::provider::DataError;
use crate::series::{PriceColumn, PricePoint, PriceSeries};

const EXTENSION: &str = "csv";

/// Cache key: the literal request tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
        }
    }

    /// `{SYMBOL}_{start}_{end}.csv` with the symbol percent-encoded for file systems.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.{EXTENSION}",
            encode_symbol(&self.symbol),
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// Inverse of [`CacheKey::file_name`].
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".csv")?;
        let mut parts = stem.rsplitn(3, '_');
        let end = parts.next()?.parse().ok()?;
        let start = parts.next()?.parse().ok()?;
        let symbol = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(decode_symbol(symbol)?, start, end))
    }
}

fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'^' | b'=' | b'_' | b'-')
}

/// Percent-encode every byte outside `[A-Za-z0-9.^=_-]` (`BRK/B` → `BRK%2FB`).
///
/// Distinct symbols always get distinct file names.
pub fn encode_symbol(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for b in symbol.bytes() {
        if is_plain(b) {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_symbol`]; `None` for anything it could not have produced.
pub fn decode_symbol(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                let b = u8::from_str_radix(hex, 16).ok()?;
                if is_plain(b) {
                    return None;
                }
                out.push(b);
                i += 3;
            }
            b if is_plain(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// One row of a cache file. The price header names the column it came from.
#[derive(Debug, Deserialize)]
struct CacheRow {
    date: NaiveDate,
    #[serde(rename = "adj_close", alias = "close")]
    price: f64,
    pct_change: f64,
}

/// A cache file found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub rows: usize,
    pub size_bytes: u64,
    pub modified: Option<NaiveDateTime>,
    /// BLAKE3 of the file contents.
    pub data_hash: String,
}

impl CacheEntry {
    /// Whether the file was last written more than `age` ago.
    pub fn older_than(&self, age: Duration, now: SystemTime) -> bool {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|elapsed| elapsed > age)
    }
}

pub struct CsvCache {
    cache_dir: PathBuf,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.file_name())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Write a series under `key`, replacing any existing file atomically.
    pub fn write(&self, key: &CacheKey, series: &PriceSeries) -> Result<PathBuf, DataError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::Cache(format!("failed to create cache dir: {e}")))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("csv.tmp");

        write_rows(&tmp_path, series).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            e
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;

        tracing::info!(symbol = %key.symbol, path = %path.display(), rows = series.len(), "cached series");
        Ok(path)
    }

    /// Load and validate the series under `key`.
    ///
    /// A missing file is `NotCached`. A file that fails validation is moved
    /// aside to `*.csv.quarantined` and reported as a cache error so the
    /// caller can refetch.
    pub fn load(&self, key: &CacheKey) -> Result<PriceSeries, DataError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(DataError::NotCached {
                symbol: key.symbol.clone(),
            });
        }

        match read_rows(&path, &key.symbol) {
            Ok(series) => Ok(series),
            Err(e) => {
                let quarantine = path.with_extension("csv.quarantined");
                tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                Err(e)
            }
        }
    }

    /// All cache files in the directory, sorted by file name.
    ///
    /// A missing cache directory is an empty cache.
    pub fn entries(&self) -> Result<Vec<CacheEntry>, DataError> {
        let dir = match fs::read_dir(&self.cache_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DataError::Cache(format!("read dir: {e}"))),
        };

        let mut entries = Vec::new();
        for item in dir {
            let item = item.map_err(|e| DataError::Cache(format!("dir entry: {e}")))?;
            let path = item.path();
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(CacheKey::parse_file_name)
            else {
                continue;
            };

            let bytes = fs::read(&path).map_err(|e| DataError::Cache(format!("read {}: {e}", path.display())))?;
            let modified = item
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(|t| DateTime::<Local>::from(t).naive_local());

            entries.push(CacheEntry {
                key,
                rows: bytes.iter().filter(|b| **b == b'\n').count().saturating_sub(1),
                size_bytes: bytes.len() as u64,
                modified,
                data_hash: blake3::hash(&bytes).to_hex().to_string(),
                path,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Entries not written for longer than `age`.
    pub fn stale_entries(&self, age: Duration) -> Result<Vec<CacheEntry>, DataError> {
        let now = SystemTime::now();
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.older_than(age, now))
            .collect())
    }

    pub fn remove(&self, entry: &CacheEntry) -> Result<(), DataError> {
        fs::remove_file(&entry.path)
            .map_err(|e| DataError::Cache(format!("remove {}: {e}", entry.path.display())))
    }
}

fn write_rows(path: &Path, series: &PriceSeries) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| DataError::Cache(format!("create {}: {e}", path.display())))?;

    writer
        .write_record(["date", series.column().label(), "pct_change"])
        .map_err(|e| DataError::Cache(format!("write header: {e}")))?;

    let pct = series.percent_change();
    for (point, pct_change) in series.points().iter().zip(pct.values) {
        writer
            .write_record([
                point.date.format("%Y-%m-%d").to_string(),
                point.price.to_string(),
                pct_change.to_string(),
            ])
            .map_err(|e| DataError::Cache(format!("write row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| DataError::Cache(format!("flush: {e}")))
}

fn read_rows(path: &Path, symbol: &str) -> Result<PriceSeries, DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Cache(format!("open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| DataError::Cache(format!("missing header: {e}")))?;
    let column = match headers.get(1) {
        Some("adj_close") => PriceColumn::AdjClose,
        Some("close") => PriceColumn::Close,
        other => return Err(DataError::Cache(format!("unexpected price column {other:?}"))),
    };

    let mut rows = Vec::new();
    for row in reader.deserialize::<CacheRow>() {
        rows.push(row.map_err(|e| DataError::Cache(format!("malformed row: {e}")))?);
    }
    if rows.is_empty() {
        return Err(DataError::Cache("empty cache file".into()));
    }

    let points: Vec<PricePoint> = rows.iter().map(|r| PricePoint::new(r.date, r.price)).collect();
    let series = PriceSeries::new(symbol, column, points)
        .map_err(|e| DataError::Cache(format!("invalid series: {e}")))?;

    if series.len() != rows.len() {
        return Err(DataError::Cache(
            "cache file has unordered, duplicate or invalid rows".into(),
        ));
    }
    let derived = series.percent_change();
    let consistent = rows
        .iter()
        .zip(&derived.values)
        .all(|(row, v)| (row.pct_change - v).abs() <= 1e-6);
    if !consistent {
        return Err(DataError::Cache("pct_change column disagrees with prices".into()));
    }

    Ok(series)
}
