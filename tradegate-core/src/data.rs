//! Candle series hygiene: sort, de-duplicate, drop malformed bars, validate.
//!
//! Strategies assume a window is ascending by timestamp with one bar per
//! timestamp. Sources run their rows through [`canonicalize`] before handing
//! them to the core.

use tracing::warn;

use crate::domain::Candle;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DataError {
    #[error("candle series is empty")]
    Empty,
    #[error("candles out of order at index {index}")]
    Unsorted { index: usize },
    #[error("duplicate timestamp at index {index}")]
    Duplicate { index: usize },
    #[error("mixed symbols in one series: '{expected}' and '{found}'")]
    MixedSymbols { expected: String, found: String },
    #[error("malformed candle at index {index}")]
    Malformed { index: usize },
}

/// What [`canonicalize`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalReport {
    pub duplicates_removed: usize,
    pub malformed_removed: usize,
    pub was_unsorted: bool,
}

impl CanonicalReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates_removed == 0 && self.malformed_removed == 0 && !self.was_unsorted
    }
}

/// Sort ascending by timestamp, keep the first bar of each timestamp and drop
/// bars that fail [`Candle::is_sane`].
pub fn canonicalize(mut candles: Vec<Candle>) -> (Vec<Candle>, CanonicalReport) {
    let mut report = CanonicalReport {
        was_unsorted: candles.windows(2).any(|w| w[0].timestamp > w[1].timestamp),
        ..CanonicalReport::default()
    };

    // Stable sort keeps the first occurrence of a timestamp first.
    candles.sort_by_key(|c| c.timestamp);

    let before = candles.len();
    candles.dedup_by_key(|c| c.timestamp);
    report.duplicates_removed = before - candles.len();

    let before = candles.len();
    candles.retain(Candle::is_sane);
    report.malformed_removed = before - candles.len();

    if !report.is_clean() {
        warn!(
            duplicates = report.duplicates_removed,
            malformed = report.malformed_removed,
            unsorted = report.was_unsorted,
            "candle series needed cleanup"
        );
    }
    (candles, report)
}

/// Check a series is non-empty, single-symbol, strictly ascending and sane.
pub fn validate_series(candles: &[Candle]) -> Result<(), DataError> {
    let first = candles.first().ok_or(DataError::Empty)?;
    for (index, c) in candles.iter().enumerate() {
        if c.symbol != first.symbol {
            return Err(DataError::MixedSymbols {
                expected: first.symbol.clone(),
                found: c.symbol.clone(),
            });
        }
        if !c.is_sane() {
            return Err(DataError::Malformed { index });
        }
        if index > 0 {
            let prev = &candles[index - 1];
            if c.timestamp == prev.timestamp {
                return Err(DataError::Duplicate { index });
            }
            if c.timestamp < prev.timestamp {
                return Err(DataError::Unsorted { index });
            }
        }
    }
    Ok(())
}
