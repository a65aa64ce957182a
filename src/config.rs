use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::limits::{MAX_SLOT_MINUTES, MIN_SLOT_MINUTES};
use crate::model::{MINUTE_MS, Ms};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub slot_minutes: i64,
    /// Deadline applied to every service call.
    pub request_timeout: Duration,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    /// Prometheus exporter port. Disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            slot_minutes: 30,
            request_timeout: Duration::from_millis(2000),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `TIMEHUB_*` variables; missing or malformed values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_string());
        Self {
            data_dir: parse("TIMEHUB_DATA_DIR")
                .filter(|v| !v.is_empty())
                .map_or(defaults.data_dir, PathBuf::from),
            slot_minutes: parsed(parse("TIMEHUB_SLOT_MINUTES"), defaults.slot_minutes),
            request_timeout: Duration::from_millis(parsed(
                parse("TIMEHUB_REQUEST_TIMEOUT_MS"),
                defaults.request_timeout.as_millis() as u64,
            )),
            compact_threshold: parsed(parse("TIMEHUB_COMPACT_THRESHOLD"), defaults.compact_threshold),
            metrics_port: parse("TIMEHUB_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }

    /// Slot length in milliseconds, clamped to the supported range.
    pub fn slot_duration_ms(&self) -> Ms {
        self.slot_minutes.clamp(MIN_SLOT_MINUTES, MAX_SLOT_MINUTES) * MINUTE_MS
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("booking.wal")
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}
