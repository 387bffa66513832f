//! CSV candle source.
//!
//! One file per (symbol, timeframe): `{data_dir}/{SYMBOL}_{timeframe}.csv`
//! with a header row `timestamp,open,high,low,close,volume`. Prices are in
//! cents. Timestamps may be RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare
//! `YYYY-MM-DD` date.
//!
//! Rows are sorted, de-duplicated and stripped of malformed bars on load.
//! An empty result after filtering is a hard error: it means the caller asked
//! for data that does not exist.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use tradegate_core::data::{canonicalize, CanonicalReport};
use tradegate_core::domain::{Candle, Market, Timeframe};

use crate::config::BacktestSection;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for {symbol} {timeframe} at {path}")]
    MissingFile {
        symbol: String,
        timeframe: Timeframe,
        path: PathBuf,
    },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} row {row}: unparseable timestamp '{value}'")]
    Timestamp { path: PathBuf, row: usize, value: String },

    #[error("no candles for {symbol} {timeframe} in the requested period")]
    NoCandles { symbol: String, timeframe: Timeframe },
}

/// What to load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub data_dir: PathBuf,
    pub symbol: String,
    pub market: Market,
    pub timeframe: Timeframe,
    /// Inclusive lower bound on the candle date.
    pub start: Option<NaiveDate>,
    /// Inclusive upper bound on the candle date.
    pub end: Option<NaiveDate>,
}

impl LoadOptions {
    pub fn path(&self) -> PathBuf {
        candle_path(&self.data_dir, &self.symbol, self.timeframe)
    }
}

impl From<&BacktestSection> for LoadOptions {
    fn from(bt: &BacktestSection) -> Self {
        Self {
            data_dir: bt.data_dir.clone(),
            symbol: bt.symbol.clone(),
            market: bt.market,
            timeframe: bt.timeframe,
            start: bt.start,
            end: bt.end,
        }
    }
}

/// Candles plus load provenance.
#[derive(Debug, Clone)]
pub struct LoadedCandles {
    pub candles: Vec<Candle>,
    pub report: CanonicalReport,
    /// BLAKE3 over the canonical series.
    pub dataset_hash: String,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// `{data_dir}/{SYMBOL}_{timeframe}.csv`
pub fn candle_path(data_dir: &Path, symbol: &str, timeframe: Timeframe) -> PathBuf {
    data_dir.join(format!("{}_{}.csv", symbol.to_uppercase(), timeframe.as_str()))
}

/// Load, canonicalize and date-filter one candle series.
pub fn load_candles(opts: &LoadOptions) -> Result<LoadedCandles, LoadError> {
    let path = opts.path();
    if !path.exists() {
        return Err(LoadError::MissingFile {
            symbol: opts.symbol.clone(),
            timeframe: opts.timeframe,
            path,
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(|source| LoadError::Csv {
            path: path.clone(),
            source,
        })?;

    let mut raw = Vec::new();
    for (i, row) in reader.deserialize::<CandleRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: path.clone(),
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.clone(),
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        if !in_range(timestamp, opts.start, opts.end) {
            continue;
        }
        raw.push(Candle {
            symbol: opts.symbol.clone(),
            market: opts.market,
            timeframe: opts.timeframe,
            timestamp,
            open: row.open.round() as i64,
            high: row.high.round() as i64,
            low: row.low.round() as i64,
            close: row.close.round() as i64,
            volume: row.volume,
        });
    }

    let (candles, report) = canonicalize(raw);
    if candles.is_empty() {
        return Err(LoadError::NoCandles {
            symbol: opts.symbol.clone(),
            timeframe: opts.timeframe,
        });
    }
    let dataset_hash = hash_candles(&candles);
    info!(
        symbol = %opts.symbol,
        timeframe = %opts.timeframe,
        bars = candles.len(),
        first = %candles[0].timestamp,
        last = %candles[candles.len() - 1].timestamp,
        "loaded candles"
    );
    Ok(LoadedCandles {
        candles,
        report,
        dataset_hash,
    })
}

/// BLAKE3 over the OHLCV content of a series, in order.
pub fn hash_candles(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.timestamp().to_le_bytes());
        for v in [c.open, c.high, c.low, c.close] {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn in_range(ts: DateTime<Utc>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    let date = ts.date_naive();
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn opts(dir: &Path) -> LoadOptions {
        LoadOptions {
            data_dir: dir.to_path_buf(),
            symbol: "BTC".into(),
            market: Market::Crypto,
            timeframe: Timeframe::Hour1,
            start: None,
            end: None,
        }
    }

    fn write(dir: &Path, body: &str) {
        let header = "timestamp,open,high,low,close,volume\n";
        std::fs::write(dir.join("BTC_1h.csv"), format!("{header}{body}")).unwrap();
    }

    #[test]
    fn path_convention() {
        let p = candle_path(Path::new("/data"), "eth", Timeframe::Hour4);
        assert_eq!(p, PathBuf::from("/data/ETH_4h.csv"));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T13:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T14:00:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01").map(|t| t.hour()), Some(0));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn loads_sorts_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "2025-01-01T02:00:00Z,102,110,95,105,10\n\
             2025-01-01T00:00:00Z,100,110,90,101,10\n\
             2025-01-01T01:00:00Z,101,110,95,102,10\n\
             2025-01-01T01:00:00Z,999,999,999,999,10\n",
        );
        let loaded = load_candles(&opts(dir.path())).unwrap();
        let closes: Vec<i64> = loaded.candles.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![101, 102, 105]);
        assert_eq!(loaded.report.duplicates_removed, 1);
        assert!(loaded.report.was_unsorted);
        assert_eq!(loaded.candles[0].symbol, "BTC");
        assert_eq!(loaded.dataset_hash.len(), 64);
    }

    #[test]
    fn date_filter_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "2025-01-01,100,110,90,100,1\n\
             2025-01-02,100,110,90,101,1\n\
             2025-01-03,100,110,90,102,1\n\
             2025-01-04,100,110,90,103,1\n",
        );
        let mut o = opts(dir.path());
        o.start = NaiveDate::from_ymd_opt(2025, 1, 2);
        o.end = NaiveDate::from_ymd_opt(2025, 1, 3);
        let loaded = load_candles(&o).unwrap();
        let closes: Vec<i64> = loaded.candles.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![101, 102]);
    }

    #[test]
    fn empty_period_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2025-01-01,100,110,90,100,1\n");
        let mut o = opts(dir.path());
        o.start = NaiveDate::from_ymd_opt(2026, 1, 1);
        assert!(matches!(load_candles(&o), Err(LoadError::NoCandles { .. })));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_candles(&opts(dir.path())),
            Err(LoadError::MissingFile { .. })
        ));
    }

    #[test]
    fn bad_timestamp_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2025-01-01,100,110,90,100,1\nnot-a-date,1,1,1,1,1\n");
        match load_candles(&opts(dir.path())) {
            Err(LoadError::Timestamp { row, value, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2025-01-01,100,110,90,100,1\n");
        let a = load_candles(&opts(dir.path())).unwrap().dataset_hash;
        write(dir.path(), "2025-01-01,100,110,90,101,1\n");
        let b = load_candles(&opts(dir.path())).unwrap().dataset_hash;
        assert_ne!(a, b);
    }
}
