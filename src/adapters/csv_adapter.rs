//! CSV price history adapter.
//!
//! One file per symbol, `<SYMBOL>.csv`, with a header row. The time column
//! is either `timestamp` (unix seconds) or `date` (`YYYY-MM-DD`, midnight
//! UTC); the price columns are found by name: `open`, `close`, `high`,
//! `low`, `volume`.

use crate::domain::candle::PriceTick;
use crate::domain::error::EngineError;
use crate::ports::price_port::PriceHistoryPort;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    time: usize,
    time_is_date: bool,
    open: usize,
    close: usize,
    high: usize,
    low: usize,
    volume: usize,
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidData { reason }
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, EngineError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| invalid(format!("missing {} column", name)))
        };
        let (time, time_is_date) = match find("timestamp") {
            Ok(index) => (index, false),
            Err(_) => (find("date")?, true),
        };
        Ok(Self {
            time,
            time_is_date,
            open: find("open")?,
            close: find("close")?,
            high: find("high")?,
            low: find("low")?,
            volume: find("volume")?,
        })
    }
}

fn decimal_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<Decimal, EngineError> {
    let raw = record
        .get(index)
        .ok_or_else(|| invalid(format!("missing {} value", name)))?;
    Decimal::from_str(raw.trim()).map_err(|e| invalid(format!("invalid {} value '{}': {}", name, raw, e)))
}

fn time_field(record: &csv::StringRecord, columns: &Columns) -> Result<i64, EngineError> {
    let raw = record
        .get(columns.time)
        .ok_or_else(|| invalid("missing time value".into()))?
        .trim();
    if columns.time_is_date {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| invalid(format!("invalid date format: {}", e)))?;
        date.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| invalid(format!("invalid date '{}'", raw)))
    } else {
        raw.parse::<i64>()
            .map_err(|e| invalid(format!("invalid timestamp '{}': {}", raw, e)))
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Parse a single history file, oldest tick first.
    pub fn read_file(path: &Path, symbol: &str) -> Result<Vec<PriceTick>, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| {
            invalid(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| invalid(format!("CSV parse error: {}", e)))?
            .clone();
        let columns = Columns::from_headers(&headers)?;

        let mut ticks = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| invalid(format!("CSV parse error: {}", e)))?;
            ticks.push(PriceTick {
                symbol: symbol.to_string(),
                timestamp: time_field(&record, &columns)?,
                open: decimal_field(&record, columns.open, "open")?,
                close: decimal_field(&record, columns.close, "close")?,
                high: decimal_field(&record, columns.high, "high")?,
                low: decimal_field(&record, columns.low, "low")?,
                volume: decimal_field(&record, columns.volume, "volume")?,
            });
        }

        ticks.sort_by_key(|t| t.timestamp);
        Ok(ticks)
    }
}

impl PriceHistoryPort for CsvAdapter {
    fn fetch_history(&self, symbol: &str, from: i64) -> Result<Vec<PriceTick>, EngineError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut ticks = Self::read_file(&path, symbol)?;
        ticks.retain(|t| t.timestamp >= from);
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let by_date = "date,open,high,low,close,volume\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";
        fs::write(path.join("BHP.csv"), by_date).unwrap();

        let by_timestamp = "timestamp,open,close,high,low,volume\n\
            86400,1.5,2.5,3,1,10\n";
        fs::write(path.join("AAPL.csv"), by_timestamp).unwrap();

        (dir, path)
    }

    #[test]
    fn date_file_sorted_oldest_first() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let ticks = adapter.fetch_history("BHP", 0).unwrap();

        assert_eq!(ticks.len(), 3);
        // 2024-01-15 00:00 UTC
        assert_eq!(ticks[0].timestamp, 1_705_276_800);
        assert_eq!(ticks[0].open, dec!(100.0));
        assert_eq!(ticks[0].high, dec!(110.0));
        assert_eq!(ticks[0].low, dec!(90.0));
        assert_eq!(ticks[0].close, dec!(105.0));
        assert_eq!(ticks[0].volume, dec!(50000));
        assert_eq!(ticks[0].symbol, "BHP");
        assert!(ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn timestamp_columns_by_name() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let ticks = adapter.fetch_history("AAPL", 0).unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].timestamp, 86_400);
        assert_eq!(ticks[0].close, dec!(2.5));
        assert_eq!(ticks[0].high, dec!(3));
    }

    #[test]
    fn fetch_filters_from() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let ticks = adapter.fetch_history("BHP", 1_705_363_200).unwrap();
        assert_eq!(ticks.len(), 2);
    }

    #[test]
    fn missing_symbol_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_history("NOPE", 0).unwrap().is_empty());
    }

    #[test]
    fn bad_number_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("X.csv");
        fs::write(&file, "timestamp,open,close,high,low,volume\n0,1,abc,1,1,1\n").unwrap();
        let err = CsvAdapter::read_file(&file, "X").unwrap_err();
        assert!(matches!(err, EngineError::InvalidData { .. }));
    }

    #[test]
    fn missing_column_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("X.csv");
        fs::write(&file, "timestamp,open,close,high,low\n0,1,1,1,1\n").unwrap();
        let err = CsvAdapter::read_file(&file, "X").unwrap_err();
        assert!(matches!(err, EngineError::InvalidData { .. }));
    }
}
