//! Engine configuration model.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the tickler engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scanner: ScannerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:.tickler/tickler.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Reminder scanner cadence. The engine is correct at any interval;
/// this only controls how promptly overdue tasks are noticed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl ScannerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scanner.interval_secs, 60);
        assert_eq!(config.scanner.interval(), Duration::from_secs(60));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
    }
}
