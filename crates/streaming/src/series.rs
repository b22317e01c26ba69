use catalog::{Record, record_timestamp};
use foundation::time::Timestamp;

/// Distinct, sorted timestamps present in one slice's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalSeries {
    pub column: String,
    pub timestamps: Vec<Timestamp>,
}

impl TemporalSeries {
    /// Builds the series from parseable cells only; returns it together with
    /// the number of rows whose date could not be parsed.
    pub fn from_records(column: &str, records: &[Record]) -> (Self, usize) {
        let mut unparseable = 0usize;
        let mut timestamps = Vec::with_capacity(records.len());
        for r in records {
            match record_timestamp(r, column) {
                Some(t) => timestamps.push(t),
                None => unparseable += 1,
            }
        }
        timestamps.sort();
        timestamps.dedup();
        (
            Self {
                column: column.to_string(),
                timestamps,
            },
            unparseable,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first(&self) -> Option<Timestamp> {
        self.timestamps.first().copied()
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }
}
