//! Small helpers shared by the manifest and the orchestrator.

mod interval;
mod version;

pub use interval::{format_interval, parse_interval};
pub use version::{compare_semver, SemVer, VersionComparison, VersionError};

use chrono::{DateTime, Utc};

/// Format a unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn human_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_date() {
        assert_eq!(human_date(0), "1970-01-01 00:00:00");
        assert_eq!(human_date(1_704_067_200), "2024-01-01 00:00:00");
        assert_eq!(human_date(1_704_067_261), "2024-01-01 00:01:01");
    }

    #[test]
    fn test_human_date_out_of_range() {
        assert_eq!(human_date(i64::MAX), i64::MAX.to_string());
    }
}
