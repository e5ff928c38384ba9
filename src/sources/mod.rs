//! Tracker record sources
//!
//! This module provides sources that read tracker data and map it to
//! chronologically ordered, one-per-day [`DailyRecord`]s.

mod csv_file;

pub use csv_file::{parse_tracker_csv, CsvTrackerSource};

use crate::error::HealthError;
use crate::types::DailyRecord;
use std::collections::BTreeMap;

/// Trait for tracker record sources
pub trait RecordSource {
    /// Load every parseable record, ordered by date
    fn load(&self) -> Result<RecordSet, HealthError>;
}

/// A row that was skipped during loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the source
    pub line: u64,
    pub reason: String,
}

/// Result of loading a source: ordered records plus the rows that were dropped
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<DailyRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// Records already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<DailyRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<DailyRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for InMemorySource {
    fn load(&self) -> Result<RecordSet, HealthError> {
        Ok(RecordSet {
            records: into_daily_records(self.records.clone()),
            skipped: Vec::new(),
        })
    }
}

/// Sort rows by date and fold rows sharing a date into one record
pub fn into_daily_records(rows: Vec<DailyRecord>) -> Vec<DailyRecord> {
    let mut by_date: BTreeMap<chrono::NaiveDate, DailyRecord> = BTreeMap::new();

    for row in rows {
        match by_date.get_mut(&row.date) {
            Some(existing) => {
                tracing::debug!(date = %row.date, "merging duplicate tracker row");
                existing.merge(row);
            }
            None => {
                by_date.insert(row.date, row);
            }
        }
    }

    by_date.into_values().collect()
}
