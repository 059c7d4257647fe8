// crates/types/src/series.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

/// Look-back window for follow-up series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "7d")]
    Last7d,
    #[default]
    #[serde(rename = "30d")]
    Last30d,
    #[serde(rename = "90d")]
    Last90d,
}

impl TimeRange {
    /// Parse from query string parameter.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Self::Last24h),
            "7d" => Some(Self::Last7d),
            "30d" => Some(Self::Last30d),
            "90d" => Some(Self::Last90d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last24h => "24h",
            Self::Last7d => "7d",
            Self::Last30d => "30d",
            Self::Last90d => "90d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Last24h => Duration::hours(24),
            Self::Last7d => Duration::days(7),
            Self::Last30d => Duration::days(30),
            Self::Last90d => Duration::days(90),
        }
    }

    /// Bucket size used when the caller does not ask for one.
    pub fn default_granularity(&self) -> Granularity {
        match self {
            Self::Last24h => Granularity::Hour,
            Self::Last7d => Granularity::Day,
            Self::Last90d => Granularity::Week,
            Self::Last30d => Granularity::Day,
        }
    }
}

impl FromStr for TimeRange {
    type Err = ParseRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s).ok_or_else(|| ParseRangeError::Range(s.to_string()))
    }
}

/// Bucket width for follow-up series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl FromStr for Granularity {
    type Err = ParseRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s).ok_or_else(|| ParseRangeError::Granularity(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRangeError {
    #[error("unknown time range '{0}' (expected 24h, 7d, 30d or 90d)")]
    Range(String),
    #[error("unknown granularity '{0}' (expected hour, day, week or month)")]
    Granularity(String),
}

/// One bucket of the follow-up series. Empty buckets are emitted with zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub bucket_start: DateTime<Utc>,
    pub events: u32,
    pub revived: u32,
    pub immediate_loss: u32,
}

impl SeriesPoint {
    pub fn empty(bucket_start: DateTime<Utc>) -> Self {
        Self {
            bucket_start,
            events: 0,
            revived: 0,
            immediate_loss: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_parse_and_default() {
        assert_eq!("7d".parse::<TimeRange>(), Ok(TimeRange::Last7d));
        assert_eq!(TimeRange::default(), TimeRange::Last30d);
        assert!(matches!("1y".parse::<TimeRange>(), Err(ParseRangeError::Range(_))));
        assert_eq!(serde_json::to_string(&TimeRange::Last90d).unwrap(), "\"90d\"");
    }

    #[test]
    fn test_default_granularity() {
        assert_eq!(TimeRange::Last24h.default_granularity(), Granularity::Hour);
        assert_eq!(TimeRange::Last7d.default_granularity(), Granularity::Day);
        assert_eq!(TimeRange::Last30d.default_granularity(), Granularity::Day);
        assert_eq!(TimeRange::Last90d.default_granularity(), Granularity::Week);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("week".parse::<Granularity>(), Ok(Granularity::Week));
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
