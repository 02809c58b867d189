//! Reporting windows.

use serde::{Deserialize, Serialize};

use crate::constants::{MS_PER_DAY, MS_PER_HOUR};
use crate::impl_domain_status_conversions;

/// Window label requested by the reporting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Hour,
    Today,
    Week,
    Month,
    Year,
    All,
}

impl_domain_status_conversions!(TimeRange {
    Hour => "hour",
    Today => "today",
    Week => "week",
    Month => "month",
    Year => "year",
    All => "all",
});

impl Default for TimeRange {
    fn default() -> Self {
        Self::Today
    }
}

/// Absolute, inclusive `[start, end]` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: i64,
    pub end: i64,
}

impl ResolvedRange {
    /// Whether `timestamp` falls inside the range, both ends inclusive.
    pub fn contains(&self, timestamp: i64) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }
}

impl TimeRange {
    /// Resolve the label against `now_ms`.
    ///
    /// Returns `None` for [`TimeRange::All`], which means a full scan.
    /// `Today` starts at midnight UTC.
    pub fn resolve(self, now_ms: i64) -> Option<ResolvedRange> {
        let start = match self {
            Self::Hour => now_ms - MS_PER_HOUR,
            Self::Today => now_ms - now_ms.rem_euclid(MS_PER_DAY),
            Self::Week => now_ms - 7 * MS_PER_DAY,
            Self::Month => now_ms - 30 * MS_PER_DAY,
            Self::Year => now_ms - 365 * MS_PER_DAY,
            Self::All => return None,
        };
        Some(ResolvedRange { start, end: now_ms })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    // 2025-01-02T09:30:00Z
    const NOW: i64 = 1_735_810_200_000;

    #[test]
    fn resolves_relative_windows_ending_now() {
        let hour = TimeRange::Hour.resolve(NOW).expect("hour resolves");
        assert_eq!(hour.end, NOW);
        assert_eq!(hour.start, NOW - MS_PER_HOUR);

        let week = TimeRange::Week.resolve(NOW).expect("week resolves");
        assert_eq!(NOW - week.start, 7 * MS_PER_DAY);
    }

    #[test]
    fn today_starts_at_utc_midnight() {
        let today = TimeRange::Today.resolve(NOW).expect("today resolves");
        assert_eq!(today.start, 1_735_776_000_000);
        assert!(today.contains(NOW));
        assert!(!today.contains(today.start - 1));
    }

    #[test]
    fn all_is_a_full_scan() {
        assert!(TimeRange::All.resolve(NOW).is_none());
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(TimeRange::from_str("Month").unwrap(), TimeRange::Month);
        assert!(TimeRange::from_str("decade").is_err());
    }
}
