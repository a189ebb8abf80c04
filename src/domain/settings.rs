//! Engine settings read from configuration and validated up front.

use std::path::PathBuf;

use chrono_tz::Tz;

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_FEED_BUFFER: usize = 64;
pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Timezone whose midnight opens each day's candle.
    pub timezone: Tz,
    /// Capacity of each symbol's tick channel.
    pub feed_buffer: usize,
    /// Symbols strategies may reference; empty accepts any symbol.
    pub symbols: Vec<String>,
    pub sqlite_path: Option<PathBuf>,
    pub pool_size: u32,
    pub csv_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            feed_buffer: DEFAULT_FEED_BUFFER,
            symbols: Vec::new(),
            sqlite_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            csv_dir: None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        Ok(Self {
            timezone: timezone(config)?,
            feed_buffer: positive(config, "engine", "feed_buffer", DEFAULT_FEED_BUFFER as i64)?
                as usize,
            symbols: symbols(config),
            sqlite_path: config.get_string("sqlite", "path").map(PathBuf::from),
            pool_size: positive(config, "sqlite", "pool_size", DEFAULT_POOL_SIZE as i64)? as u32,
            csv_dir: config.get_string("history", "csv_dir").map(PathBuf::from),
        })
    }

    /// Whether strategies for `symbol` may be added.
    pub fn knows_symbol(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    pub fn require_sqlite_path(&self) -> Result<&PathBuf, EngineError> {
        self.sqlite_path
            .as_ref()
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            })
    }
}

fn timezone(config: &dyn ConfigPort) -> Result<Tz, EngineError> {
    match config.get_string("engine", "timezone") {
        None => Ok(Tz::UTC),
        Some(name) => name.trim().parse::<Tz>().map_err(|_| EngineError::ConfigInvalid {
            section: "engine".to_string(),
            key: "timezone".to_string(),
            reason: format!("unknown timezone '{}'", name.trim()),
        }),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, EngineError> {
    let invalid = |reason: String| EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    };
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid(format!("{} must be an integer, got '{}'", key, raw.trim())))?;
    if value < 1 || value > u32::MAX as i64 {
        return Err(invalid(format!("{} must be at least 1", key)));
    }
    Ok(value)
}

fn symbols(config: &dyn ConfigPort) -> Vec<String> {
    config
        .get_list("engine", "symbols")
        .into_iter()
        .map(|s| s.to_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn settings(ini: &str) -> Result<EngineSettings, EngineError> {
        let config = FileConfigAdapter::from_string(ini).unwrap();
        EngineSettings::from_config(&config)
    }

    #[test]
    fn defaults_when_empty() {
        let s = settings("[engine]\n").unwrap();
        assert_eq!(s, EngineSettings::default());
        assert!(s.knows_symbol("ANY"));
    }

    #[test]
    fn full_config() {
        let s = settings(
            "[engine]\ntimezone = America/New_York\nfeed_buffer = 8\nsymbols = aapl, MSFT\n\
             [sqlite]\npath = /tmp/alerts.db\npool_size = 2\n\
             [history]\ncsv_dir = /tmp/history\n",
        )
        .unwrap();
        assert_eq!(s.timezone, chrono_tz::America::New_York);
        assert_eq!(s.feed_buffer, 8);
        assert_eq!(s.symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(s.sqlite_path, Some(PathBuf::from("/tmp/alerts.db")));
        assert_eq!(s.pool_size, 2);
        assert_eq!(s.csv_dir, Some(PathBuf::from("/tmp/history")));
        assert!(s.knows_symbol("aapl"));
        assert!(!s.knows_symbol("TSLA"));
    }

    #[test]
    fn invalid_timezone() {
        let err = settings("[engine]\ntimezone = Mars/Olympus\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "timezone"));
    }

    #[test]
    fn zero_feed_buffer_rejected() {
        let err = settings("[engine]\nfeed_buffer = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "feed_buffer"));
    }

    #[test]
    fn non_numeric_pool_size_rejected() {
        let err = settings("[sqlite]\npool_size = many\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "pool_size"));
    }

    #[test]
    fn sqlite_path_required_on_demand() {
        let s = settings("[engine]\n").unwrap();
        assert!(matches!(
            s.require_sqlite_path(),
            Err(EngineError::ConfigMissing { .. })
        ));
    }
}
