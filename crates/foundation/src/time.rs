//! Calendar time primitives.
//!
//! All timestamps are naive (zone-less) date-times; slices report wall-clock
//! values and the scene compares them as-is.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub type Timestamp = NaiveDateTime;

/// Temporal bucket size. Ordered finest to coarsest, so `max()` is the coarsest.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Parses plain names (`"month"`) and ISO-8601 grains (`"P1M"`, `"PT1H"`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" | "pt1h" => Some(Self::Hour),
            "day" | "daily" | "p1d" => Some(Self::Day),
            "week" | "weekly" | "p1w" => Some(Self::Week),
            "month" | "monthly" | "p1m" => Some(Self::Month),
            "year" | "yearly" | "p1y" => Some(Self::Year),
            _ => None,
        }
    }

    /// Unrecognized or absent granularity defaults to day.
    pub fn from_config(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }

    /// Coarsest granularity among `items`, day when empty.
    pub fn coarsest(items: impl IntoIterator<Item = Self>) -> Self {
        items.into_iter().max().unwrap_or_default()
    }

    /// `start` moved by `n` steps of this granularity.
    ///
    /// Month and year steps use calendar arithmetic relative to `start`, so a
    /// sequence anchored on the 31st lands on the last day of shorter months
    /// without drifting.
    pub fn offset(self, start: Timestamp, n: i64) -> Option<Timestamp> {
        match self {
            Self::Hour => start.checked_add_signed(Duration::try_hours(n)?),
            Self::Day => start.checked_add_signed(Duration::try_days(n)?),
            Self::Week => start.checked_add_signed(Duration::try_weeks(n)?),
            Self::Month => add_months(start, n),
            Self::Year => add_months(start, n.checked_mul(12)?),
        }
    }

    /// Start of the bucket containing `t`. Weeks start on Monday.
    pub fn truncate(self, t: Timestamp) -> Timestamp {
        let date = t.date();
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);
        match self {
            Self::Hour => t
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(t),
            Self::Day => midnight(date),
            Self::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                midnight(date - Duration::days(back))
            }
            Self::Month => midnight(date.with_day(1).unwrap_or(date)),
            Self::Year => midnight(
                NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            ),
        }
    }
}

fn add_months(start: Timestamp, n: i64) -> Option<Timestamp> {
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        start.checked_add_months(months)
    } else {
        start.checked_sub_months(months)
    }
}

/// Inclusive `[min, max]` time range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub min: Timestamp,
    pub max: Timestamp,
}

impl TimeRange {
    pub fn new(a: Timestamp, b: Timestamp) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn instant(t: Timestamp) -> Self {
        Self { min: t, max: t }
    }

    /// Smallest range covering every timestamp, `None` when empty.
    pub fn covering(items: impl IntoIterator<Item = Timestamp>) -> Option<Self> {
        let mut out: Option<Self> = None;
        for t in items {
            out = Some(match out {
                Some(r) => Self::new(r.min.min(t), r.max.max(t)),
                None => Self::instant(t),
            });
        }
        out
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        t >= self.min && t <= self.max
    }

    pub fn clamp(&self, t: Timestamp) -> Timestamp {
        t.clamp(self.min, self.max)
    }
}

/// Parses the textual date formats slices report.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub fn timestamp_from_epoch_millis(ms: i64) -> Option<Timestamp> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Local wall-clock time.
pub fn local_now() -> Timestamp {
    chrono::Local::now().naive_local()
}

/// Same calendar day, ignoring the time of day.
pub fn same_calendar_day(a: Timestamp, b: Timestamp) -> bool {
    a.date() == b.date()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn granularity_orders_coarsest_last() {
        assert_eq!(
            Granularity::coarsest([Granularity::Day, Granularity::Month, Granularity::Hour]),
            Granularity::Month
        );
        assert_eq!(Granularity::coarsest([]), Granularity::Day);
    }

    #[test]
    fn parses_names_and_iso_grains() {
        assert_eq!(Granularity::parse("P1W"), Some(Granularity::Week));
        assert_eq!(Granularity::parse(" Year "), Some(Granularity::Year));
        assert_eq!(Granularity::from_config(Some("fortnight")), Granularity::Day);
        assert_eq!(Granularity::from_config(None), Granularity::Day);
    }

    #[test]
    fn month_offsets_clamp_to_month_end() {
        let start = ymd(2024, 1, 31);
        assert_eq!(Granularity::Month.offset(start, 1), Some(ymd(2024, 2, 29)));
        assert_eq!(Granularity::Month.offset(start, 2), Some(ymd(2024, 3, 31)));
        assert_eq!(Granularity::Year.offset(ymd(2024, 2, 29), 1), Some(ymd(2025, 2, 28)));
    }

    #[test]
    fn truncates_to_bucket_start() {
        let t = parse_timestamp("2024-03-14T15:09:26").unwrap();
        assert_eq!(Granularity::Day.truncate(t), ymd(2024, 3, 14));
        assert_eq!(Granularity::Week.truncate(t), ymd(2024, 3, 11));
        assert_eq!(Granularity::Month.truncate(t), ymd(2024, 3, 1));
        assert_eq!(Granularity::Year.truncate(t), ymd(2024, 1, 1));
        assert_eq!(
            Granularity::Hour.truncate(t),
            parse_timestamp("2024-03-14 15:00:00").unwrap()
        );
    }

    #[test]
    fn parses_supported_formats() {
        assert_eq!(parse_timestamp("2024-03-01"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_timestamp("2024-03-01T00:00:00Z"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_timestamp("2024-03-01 00:00"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(timestamp_from_epoch_millis(0), Some(ymd(1970, 1, 1)));
    }

    #[test]
    fn range_clamps_and_covers() {
        let r = TimeRange::covering([ymd(2024, 1, 5), ymd(2024, 1, 1), ymd(2024, 1, 3)]).unwrap();
        assert_eq!(r.min, ymd(2024, 1, 1));
        assert_eq!(r.max, ymd(2024, 1, 5));
        assert_eq!(r.clamp(ymd(2030, 1, 1)), ymd(2024, 1, 5));
        assert!(r.contains(ymd(2024, 1, 2)));
    }

    #[test]
    fn calendar_day_match_ignores_time() {
        let a = parse_timestamp("2024-03-01T00:00").unwrap();
        assert!(same_calendar_day(a, parse_timestamp("2024-03-01T18:30").unwrap()));
        assert!(!same_calendar_day(a, parse_timestamp("2024-03-02T23:59").unwrap()));
    }
}
