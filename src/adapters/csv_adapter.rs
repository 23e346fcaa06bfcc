//! CSV bar history adapter.
//!
//! One file per symbol, `<SYMBOL>.csv`, with a header row and columns
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (UTC) or unix seconds.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }

    pub fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, TraderError> {
        let path = self.csv_path(symbol);
        let feed_error = |reason: String| TraderError::Feed {
            symbol: symbol.to_string(),
            reason,
        };
        let content = fs::read_to_string(&path)
            .map_err(|e| feed_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.deserialize::<BarRow>().enumerate() {
            let record = result?;
            let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| {
                feed_error(format!("row {}: invalid timestamp '{}'", row + 1, record.timestamp))
            })?;
            bars.push(Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.unwrap_or(0.0),
            });
        }

        Ok(bars)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
