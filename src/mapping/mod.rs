//! Field mapping rules shared by the adapters.
//!
//! Each adapter owns its upstream record types and mapper functions; this module
//! holds the rules they all apply the same way: thumbnail resolution, duration
//! units, popularity sums, timestamp parsing and tag summaries.

pub mod lenient;

use crate::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Number of tags rendered into collection and channel descriptions
pub const TOP_TAG_COUNT: usize = 5;

/// What a record with no usable publish date reports as its timestamp
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestamp {
    /// Time of mapping
    #[default]
    Now,
    /// Unix epoch, i.e. `0`
    Epoch,
}

impl std::str::FromStr for MissingTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "now" => Ok(Self::Now),
            "epoch" => Ok(Self::Epoch),
            other => Err(Error::invalid_input(
                "missing_timestamp",
                format!("expected 'now' or 'epoch', got '{other}'"),
            )),
        }
    }
}

/// Per-call mapping inputs
#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    /// Milliseconds since epoch at the start of the call
    pub now_ms: i64,
    pub missing_timestamp: MissingTimestamp,
}

impl MapOptions {
    #[must_use]
    pub fn new(missing_timestamp: MissingTimestamp) -> Self {
        Self {
            now_ms: Utc::now().timestamp_millis(),
            missing_timestamp,
        }
    }

    /// Fixed clock, for deterministic mapping
    #[must_use]
    pub const fn at(now_ms: i64, missing_timestamp: MissingTimestamp) -> Self {
        Self {
            now_ms,
            missing_timestamp,
        }
    }

    #[must_use]
    pub const fn fallback_timestamp(&self) -> i64 {
        match self.missing_timestamp {
            MissingTimestamp::Now => self.now_ms,
            MissingTimestamp::Epoch => 0,
        }
    }

    /// Parse a publish date, falling back to the configured policy
    #[must_use]
    pub fn timestamp(&self, raw: Option<&str>) -> i64 {
        raw.and_then(parse_timestamp_ms)
            .unwrap_or_else(|| self.fallback_timestamp())
    }
}

/// Resolve an image reference: absolute URLs pass through, bare tokens go
/// through the proxy template (`{}` is replaced by the encoded token)
#[must_use]
pub fn thumbnail_url(raw: Option<&str>, proxy_template: &str) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

    if raw.starts_with("http://") || raw.starts_with("https://") {
        Some(raw.to_string())
    } else {
        Some(proxy_template.replace("{}", &urlencoding::encode(raw)))
    }
}

/// Seconds to whole milliseconds; missing or negative durations are 0
#[must_use]
pub fn duration_ms(seconds: Option<f64>) -> u64 {
    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => (s * 1000.0).round() as u64,
        _ => 0,
    }
}

/// Parse `hh:mm:ss`, `mm:ss` or plain seconds
#[must_use]
pub fn clock_seconds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if !raw.contains(':') {
        return raw.parse::<f64>().ok().filter(|s| s.is_finite());
    }

    raw.split(':').try_fold(0.0, |total, part| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| total * 60.0 + n)
    })
}

/// Sum of two popularity counters, missing values count as 0
#[must_use]
pub fn popularity(first: Option<u64>, second: Option<u64>) -> u64 {
    first.unwrap_or(0).saturating_add(second.unwrap_or(0))
}

/// Subscriber counts of 0 or less are unknown, not zero
#[must_use]
pub fn subscribers(raw: Option<i64>) -> Option<u64> {
    raw.filter(|n| *n > 0).and_then(|n| u64::try_from(n).ok())
}

/// Milliseconds since epoch for RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
#[must_use]
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// `#tag` summary of the heaviest tags: weight descending, ties by name
#[must_use]
pub fn top_tags(tags: &BTreeMap<String, f64>, limit: usize) -> String {
    let mut ranked: Vec<(&String, f64)> = tags.iter().map(|(tag, w)| (tag, *w)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(tag, _)| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a batch of raw upstream records.
///
/// Records that fail to deserialize or that the mapper rejects are dropped and
/// logged; one bad record never fails the batch.
pub fn map_batch<U, R, F>(record: &str, values: &[Value], mut mapper: F) -> Vec<R>
where
    U: DeserializeOwned,
    F: FnMut(U) -> std::result::Result<R, Error>,
{
    let mut mapped = Vec::with_capacity(values.len());

    for value in values {
        let outcome = serde_json::from_value::<U>(value.clone())
            .map_err(|e| Error::UnmappableRecord {
                record: record.to_string(),
                reason: e.to_string(),
            })
            .and_then(&mut mapper);

        match outcome {
            Ok(item) => mapped.push(item),
            Err(e) => warn!("Dropping {} record: {}", record, e),
        }
    }

    mapped
}

/// Reject a record that lacks an identifier
pub fn require_id(record: &str, id: Option<String>) -> std::result::Result<String, Error> {
    id.ok_or_else(|| Error::UnmappableRecord {
        record: record.to_string(),
        reason: "missing identifier".to_string(),
    })
}

/// Non-empty name or the supplied placeholder
#[must_use]
pub fn name_or(name: Option<String>, placeholder: &str) -> String {
    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| placeholder.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROXY: &str = "https://imgproxy.ra.co/_/quality:75/plain/{}";

    #[test]
    fn test_thumbnail_resolution() {
        assert_eq!(
            thumbnail_url(Some("https://img.example/a.jpg"), PROXY).as_deref(),
            Some("https://img.example/a.jpg")
        );
        assert_eq!(
            thumbnail_url(Some("abc/def"), PROXY).as_deref(),
            Some("https://imgproxy.ra.co/_/quality:75/plain/abc%2Fdef")
        );
        assert_eq!(thumbnail_url(Some(""), PROXY), None);
        assert_eq!(thumbnail_url(None, PROXY), None);
    }

    #[test]
    fn test_duration_and_popularity() {
        assert_eq!(duration_ms(Some(245.0)), 245_000);
        assert_eq!(duration_ms(Some(1.5)), 1500);
        assert_eq!(duration_ms(None), 0);
        assert_eq!(duration_ms(Some(-3.0)), 0);

        assert_eq!(popularity(Some(10), Some(5)), 15);
        assert_eq!(popularity(None, Some(5)), 5);
        assert_eq!(popularity(None, None), 0);
    }

    #[test]
    fn test_clock_seconds() {
        assert_eq!(clock_seconds("01:02:03"), Some(3723.0));
        assert_eq!(clock_seconds("02:30"), Some(150.0));
        assert_eq!(clock_seconds("95.5"), Some(95.5));
        assert_eq!(clock_seconds("soon"), None);
    }

    #[test]
    fn test_subscribers_zero_is_unknown() {
        assert_eq!(subscribers(Some(0)), None);
        assert_eq!(subscribers(Some(-4)), None);
        assert_eq!(subscribers(Some(12)), Some(12));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(parse_timestamp_ms("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_timestamp_ms("1970-01-01 00:00:01"), Some(1000));
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:02Z"), Some(2000));
        assert_eq!(parse_timestamp_ms("yesterday"), None);

        let now = MapOptions::at(5_000, MissingTimestamp::Now);
        assert_eq!(now.timestamp(None), 5_000);
        assert_eq!(now.timestamp(Some("garbage")), 5_000);

        let epoch = MapOptions::at(5_000, MissingTimestamp::Epoch);
        assert_eq!(epoch.timestamp(None), 0);
        assert_eq!(epoch.timestamp(Some("1970-01-02")), 86_400_000);
    }

    #[test]
    fn test_top_tags_order() {
        let tags: BTreeMap<String, f64> = [
            ("rock", 3.0),
            ("jazz", 5.0),
            ("ambient", 3.0),
            ("pop", 1.0),
            ("folk", 2.0),
            ("metal", 0.5),
        ]
        .into_iter()
        .map(|(t, w)| (t.to_string(), w))
        .collect();

        assert_eq!(top_tags(&tags, 5), "#jazz #ambient #rock #folk #pop");
        assert_eq!(top_tags(&BTreeMap::new(), 5), "");
    }

    #[test]
    fn test_map_batch_drops_bad_records() {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default, deserialize_with = "lenient::string")]
            id: Option<String>,
        }

        let values = vec![json!({"id": 1}), json!({"name": "no id"}), json!("not an object")];
        let ids = map_batch("track", &values, |raw: Raw| require_id("track", raw.id));
        assert_eq!(ids, vec!["1".to_string()]);
    }

    #[test]
    fn test_missing_timestamp_from_str() {
        assert_eq!("EPOCH".parse::<MissingTimestamp>().unwrap(), MissingTimestamp::Epoch);
        assert!("later".parse::<MissingTimestamp>().is_err());
    }
}
