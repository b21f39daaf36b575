use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use regex::Regex;

use crate::{ConfigError, StaleReason};

/// State of a cache entry relative to an optional maximum age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

/// Check a cache entry without touching it.
///
/// Anything that is not a readable regular file counts as missing. Without a
/// `max_age` an existing file never expires. A modification time in the future
/// is treated as age zero.
pub fn freshness(path: &Path, max_age: Option<Duration>) -> Freshness {
    let meta = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Freshness::Stale(StaleReason::Missing),
    };
    let Some(max_age) = max_age else {
        return Freshness::Fresh;
    };
    let Ok(modified) = meta.modified() else {
        return Freshness::Stale(StaleReason::Missing);
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age > max_age {
        Freshness::Stale(StaleReason::Expired { age })
    } else {
        Freshness::Fresh
    }
}

pub fn is_stale(path: &Path, max_age: Option<Duration>) -> bool {
    matches!(freshness(path, max_age), Freshness::Stale(_))
}

/// Parse free-form duration text such as `"5 seconds"`, `"1 day"` or
/// `"2h 30min"`. A bare number is a count of seconds.
pub fn parse_max_age(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).map_err(|err| ConfigError::InvalidDuration {
            input: input.to_string(),
            message: err.to_string(),
        });
    }

    // humantime wants "5seconds"; people write "5 seconds".
    static GAP: OnceLock<Regex> = OnceLock::new();
    let gap = GAP.get_or_init(|| Regex::new(r"(\d)\s+([A-Za-z])").expect("static regex"));
    let compact = gap.replace_all(trimmed, "$1$2");
    let compact = compact.replace(" and ", " ").replace(',', " ");

    humantime::parse_duration(compact.trim()).map_err(|err| ConfigError::InvalidDuration {
        input: input.to_string(),
        message: err.to_string(),
    })
}
