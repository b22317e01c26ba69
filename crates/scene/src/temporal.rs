//! Shared time cursor over every temporal slice.

use catalog::{Record, record_timestamp};
use foundation::time::{Granularity, TimeRange, Timestamp};
use streaming::TemporalSeries;

/// Upper bound on enumerated dates; longer sequences are cut off.
pub const MAX_DATES: usize = 100_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

/// Coarsest common granularity, the enumerated date sequence and the
/// current instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalIndex {
    granularity: Granularity,
    range: Option<TimeRange>,
    dates: Vec<Timestamp>,
    current: Option<usize>,
    truncated: bool,
}

impl TemporalIndex {
    /// Builds the index from `(granularity, series)` pairs; the current
    /// instant starts nearest to `now`.
    pub fn build<'a>(
        inputs: impl IntoIterator<Item = (Granularity, &'a TemporalSeries)>,
        now: Timestamp,
    ) -> Self {
        let mut granularities = Vec::new();
        let mut stamps = Vec::new();
        for (g, series) in inputs {
            granularities.push(g);
            stamps.extend(series.first());
            stamps.extend(series.last());
        }
        let granularity = Granularity::coarsest(granularities);
        let range = TimeRange::covering(stamps);
        let dates = range
            .map(|r| Self::enumerate(r.min, r.max, granularity))
            .unwrap_or_default();
        let truncated = dates.len() == MAX_DATES
            && range.is_some_and(|r| {
                granularity
                    .offset(r.min, MAX_DATES as i64)
                    .is_some_and(|t| t <= r.max)
            });
        let mut index = Self {
            granularity,
            range,
            dates,
            current: None,
            truncated,
        };
        index.init_current(now);
        index
    }

    /// Dates from `min` to `max` inclusive, `n` calendar steps from `min`.
    pub fn enumerate(min: Timestamp, max: Timestamp, granularity: Granularity) -> Vec<Timestamp> {
        let mut out = Vec::new();
        for n in 0..MAX_DATES as i64 {
            match granularity.offset(min, n) {
                Some(t) if t <= max => out.push(t),
                _ => break,
            }
        }
        out
    }

    /// Points the cursor at the enumerated date nearest to `now` clamped into
    /// the range. Ties resolve to the earlier date.
    pub fn init_current(&mut self, now: Timestamp) {
        self.current = self.nearest(now);
    }

    fn nearest(&self, t: Timestamp) -> Option<usize> {
        let t = self.range?.clamp(t);
        self.dates
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| (**d - t).abs())
            .map(|(i, _)| i)
    }

    /// Rebuilds from new inputs, keeping the current instant when it is still
    /// enumerated and otherwise moving to the date nearest to it.
    pub fn rebuild<'a>(
        &mut self,
        inputs: impl IntoIterator<Item = (Granularity, &'a TemporalSeries)>,
        now: Timestamp,
    ) {
        let previous = self.current_instant();
        let mut next = Self::build(inputs, now);
        if let Some(prev) = previous {
            next.current = next
                .dates
                .iter()
                .position(|d| *d == prev)
                .or_else(|| next.nearest(prev));
        }
        *self = next;
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn dates(&self) -> &[Timestamp] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Whether the range held more than [`MAX_DATES`] steps and the tail was
    /// dropped.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn current_instant(&self) -> Option<Timestamp> {
        self.dates.get(self.current?).copied()
    }

    /// Moves the cursor to `t` if it is an enumerated date.
    pub fn set_current(&mut self, t: Timestamp) -> bool {
        match self.dates.iter().position(|d| *d == t) {
            Some(i) if self.current != Some(i) => {
                self.current = Some(i);
                true
            }
            _ => false,
        }
    }

    /// Adjacent date; no-op at either boundary. Returns whether it moved.
    pub fn step(&mut self, direction: Direction) -> bool {
        let Some(i) = self.current else {
            return false;
        };
        let next = match direction {
            Direction::Forward if i + 1 < self.dates.len() => i + 1,
            Direction::Backward if i > 0 => i - 1,
            _ => return false,
        };
        self.current = Some(next);
        true
    }

    /// Exact comparison against the current instant; no truncation.
    pub fn is_current(&self, t: Timestamp) -> bool {
        self.current_instant() == Some(t)
    }

    /// Rows whose `column` falls on the current instant once both sides are
    /// truncated to the index granularity.
    pub fn current_rows(&self, rows: &[Record], column: &str) -> Vec<Record> {
        let Some(current) = self.current_instant() else {
            return Vec::new();
        };
        let g = self.granularity;
        let target = g.truncate(current);
        rows.iter()
            .filter(|r| record_timestamp(r, column).is_some_and(|t| g.truncate(t) == target))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::time::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn ts(raw: &str) -> Timestamp {
        parse_timestamp(raw).unwrap()
    }

    fn series(dates: &[&str]) -> TemporalSeries {
        TemporalSeries {
            column: "d".into(),
            timestamps: dates.iter().map(|d| ts(d)).collect(),
        }
    }

    #[test]
    fn enumerates_days_inclusive() {
        let dates = TemporalIndex::enumerate(ts("2024-01-01"), ts("2024-01-08"), Granularity::Day);
        assert_eq!(dates.len(), 8);
        assert_eq!(dates.first(), Some(&ts("2024-01-01")));
        assert_eq!(dates.last(), Some(&ts("2024-01-08")));
    }

    #[test]
    fn long_hourly_ranges_are_cut_off() {
        let long = series(&["2000-01-01", "2013-01-01"]);
        let index = TemporalIndex::build([(Granularity::Hour, &long)], ts("2005-06-01"));
        assert!(index.is_truncated());
        assert_eq!(index.dates().len(), MAX_DATES);
        assert!(index.dates().last().is_some_and(|d| *d < ts("2013-01-01")));

        let short = series(&["2000-01-01", "2001-01-01"]);
        let index = TemporalIndex::build([(Granularity::Hour, &short)], ts("2000-06-01"));
        assert!(!index.is_truncated());
    }

    #[test]
    fn enumerates_calendar_months() {
        let dates =
            TemporalIndex::enumerate(ts("2024-01-31"), ts("2024-03-31"), Granularity::Month);
        assert_eq!(dates, vec![ts("2024-01-31"), ts("2024-02-29"), ts("2024-03-31")]);
    }

    #[test]
    fn picks_coarsest_granularity() {
        let daily = series(&["2024-01-01", "2024-03-15"]);
        let monthly = series(&["2024-02-01"]);
        let index = TemporalIndex::build(
            [(Granularity::Day, &daily), (Granularity::Month, &monthly)],
            ts("2024-02-10"),
        );
        assert_eq!(index.granularity(), Granularity::Month);
        assert_eq!(index.dates(), &[ts("2024-01-01"), ts("2024-02-01"), ts("2024-03-01")]);
        assert_eq!(index.current_instant(), Some(ts("2024-02-01")));
    }

    #[test]
    fn initial_instant_is_clamped_into_range() {
        let s = series(&["2024-01-01", "2024-01-05"]);
        let late = TemporalIndex::build([(Granularity::Day, &s)], ts("2030-01-01"));
        assert_eq!(late.current_instant(), Some(ts("2024-01-05")));
        let early = TemporalIndex::build([(Granularity::Day, &s)], ts("1999-01-01"));
        assert_eq!(early.current_instant(), Some(ts("2024-01-01")));
    }

    #[test]
    fn step_stops_at_boundaries() {
        let s = series(&["2024-01-01", "2024-01-03"]);
        let mut index = TemporalIndex::build([(Granularity::Day, &s)], ts("2024-01-01"));
        assert!(!index.step(Direction::Backward));
        assert!(index.step(Direction::Forward));
        assert!(index.step(Direction::Forward));
        assert!(!index.step(Direction::Forward));
        assert_eq!(index.current_instant(), Some(ts("2024-01-03")));
        assert!(index.is_current(ts("2024-01-03")));
        assert!(!index.is_current(ts("2024-01-03T00:00:01")));
    }

    #[test]
    fn rebuild_keeps_cursor_when_still_enumerated() {
        let s = series(&["2024-01-01", "2024-01-05"]);
        let mut index = TemporalIndex::build([(Granularity::Day, &s)], ts("2024-01-01"));
        index.set_current(ts("2024-01-03"));
        let wider = series(&["2023-12-30", "2024-01-05"]);
        index.rebuild([(Granularity::Day, &wider)], ts("2024-01-05"));
        assert_eq!(index.current_instant(), Some(ts("2024-01-03")));
    }

    #[test]
    fn empty_inputs_have_no_instant() {
        let mut index = TemporalIndex::build(std::iter::empty(), ts("2024-01-01"));
        assert!(index.is_empty());
        assert_eq!(index.current_instant(), None);
        assert!(!index.step(Direction::Forward));
    }
}
