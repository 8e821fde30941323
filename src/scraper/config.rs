use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::discovery::Strategy;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid interval '{input}': {reason}. Use a format like '30s', '15m', '1h' or '1d'")]
pub struct IntervalError {
    pub input: String,
    pub reason: String,
}

/// Configuration for the periodic scraper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Time between runs, e.g. "1h" or "30m" (default: "1h")
    pub interval: String,

    /// Run once immediately when the schedule starts (default: true)
    pub run_on_start: bool,

    /// Pages fetched per category in one run (default: 3)
    pub pages_per_run: u32,

    /// Pause between page requests in milliseconds (default: 1000)
    pub request_delay_ms: u64,

    /// Categories walked by each run
    pub categories: Vec<String>,

    /// Start every run again from page 1 (default: true)
    pub restart_each_run: bool,

    /// Strategy tried first for each page
    pub strategy: Strategy,

    /// Published IDs remembered for de-duplication; the oldest are forgotten
    /// first (default: 10000)
    pub max_remembered: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            interval: "1h".to_string(),
            run_on_start: true,
            pages_per_run: 3,
            request_delay_ms: 1000,
            categories: vec!["all".to_string()],
            restart_each_run: true,
            strategy: Strategy::PagedApi,
            max_remembered: 10_000,
        }
    }
}

impl ScraperConfig {
    pub fn interval(&self) -> Result<Duration, IntervalError> {
        parse_interval(&self.interval).map(Duration::from_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Parse interval string like "1h", "30m", "6h", "1d" into seconds
pub fn parse_interval(s: &str) -> Result<u64, IntervalError> {
    let s = s.trim().to_lowercase();
    let fail = |reason: &str| IntervalError {
        input: s.clone(),
        reason: reason.to_string(),
    };

    let scaled = |digits: &str, unit: u64, name: &str| -> Result<u64, IntervalError> {
        digits
            .parse::<u64>()
            .map_err(|_| fail(&format!("invalid {}", name)))?
            .checked_mul(unit)
            .ok_or_else(|| fail(&format!("too many {}", name)))
    };

    let secs = if let Some(hours) = s.strip_suffix('h') {
        scaled(hours, 3600, "hours")?
    } else if let Some(minutes) = s.strip_suffix('m') {
        scaled(minutes, 60, "minutes")?
    } else if let Some(days) = s.strip_suffix('d') {
        scaled(days, 86400, "days")?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map_err(|_| fail("invalid seconds"))?
    } else {
        // Raw seconds
        s.parse::<u64>().map_err(|_| fail("not a number"))?
    };

    if secs == 0 {
        return Err(fail("must be greater than zero"));
    }
    Ok(secs)
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config_values() {
        let config = ScraperConfig::default();
        assert!(config.run_on_start);
        assert_eq!(config.pages_per_run, 3);
        assert_eq!(config.request_delay(), Duration::from_millis(1000));
        assert_eq!(config.categories, vec!["all"]);
        assert_eq!(config.max_remembered, 10_000);
        assert_eq!(config.interval(), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(assert_ok!(parse_interval("30s")), 30);
        assert_eq!(assert_ok!(parse_interval("15m")), 900);
        assert_eq!(assert_ok!(parse_interval(" 1H ")), 3600);
        assert_eq!(assert_ok!(parse_interval("1d")), 86400);
        assert_eq!(assert_ok!(parse_interval("120")), 120);
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert_err!(parse_interval("soon"));
        assert_err!(parse_interval("xh"));
        assert_err!(parse_interval(""));

        let zero = assert_err!(parse_interval("0m"));
        assert_eq!(zero.reason, "must be greater than zero");
        assert_eq!(zero.input, "0m");
    }

    #[test]
    fn test_parse_interval_rejects_overflow() {
        assert_eq!(
            assert_ok!(parse_interval("5124095576030431h")),
            5_124_095_576_030_431 * 3600
        );

        let hours = assert_err!(parse_interval("5124095576030432h"));
        assert_eq!(hours.reason, "too many hours");
        let days = assert_err!(parse_interval("213503982334602d"));
        assert_eq!(days.reason, "too many days");
        let minutes = assert_err!(parse_interval("307445734561825861m"));
        assert_eq!(minutes.reason, "too many minutes");
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(86400), "1d");
        assert_eq!(format_interval(7200), "2h");
        assert_eq!(format_interval(900), "15m");
        assert_eq!(format_interval(45), "45s");
        assert_eq!(format_interval(90), "90s");
    }
}
