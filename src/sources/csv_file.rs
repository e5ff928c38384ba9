//! CSV tracker source
//!
//! Parses the tracker spreadsheet export. A malformed row is skipped and
//! reported; only a missing file or a header without a `date` column is fatal.

use crate::error::HealthError;
use crate::types::DailyRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use super::{into_daily_records, RecordSet, RecordSource, SkippedRow};

/// Accepted date layouts, tried in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Tracker CSV on disk
#[derive(Debug, Clone)]
pub struct CsvTrackerSource {
    path: PathBuf,
}

impl CsvTrackerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvTrackerSource {
    fn load(&self) -> Result<RecordSet, HealthError> {
        let file = File::open(&self.path).map_err(|source| HealthError::SourceUnavailable {
            path: self.path.clone(),
            source,
        })?;
        let set = parse_tracker_csv(file)?;
        tracing::info!(
            path = %self.path.display(),
            records = set.records.len(),
            skipped = set.skipped.len(),
            "loaded tracker records"
        );
        Ok(set)
    }
}

/// Raw CSV row; every cell is optional and leniently parsed
#[derive(Debug, Default, Deserialize)]
struct TrackerRow {
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    waist_cm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    body_fat_pct: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    calories_kcal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    protein_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    carbs_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fat_g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    sleep_hours: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    recovery_score: Option<f64>,
    #[serde(default, alias = "hrv_rmssd_ms", deserialize_with = "lenient_f64")]
    hrv_rmssd: Option<f64>,
    #[serde(default, alias = "resting_hr_bpm", deserialize_with = "lenient_f64")]
    resting_hr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    strain: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    meal_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    notes: Option<String>,
}

impl TrackerRow {
    fn into_record(self) -> Result<DailyRecord, String> {
        let raw_date = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| "missing date".to_string())?;
        let date = parse_date(raw_date).ok_or_else(|| format!("unparseable date '{raw_date}'"))?;

        Ok(DailyRecord {
            date,
            weight_kg: self.weight_kg,
            waist_cm: self.waist_cm,
            body_fat_pct: self.body_fat_pct,
            calories_kcal: self.calories_kcal,
            protein_g: self.protein_g,
            carbs_g: self.carbs_g,
            fat_g: self.fat_g,
            sleep_hours: self.sleep_hours,
            recovery_score: self.recovery_score,
            hrv_rmssd_ms: self.hrv_rmssd,
            resting_hr_bpm: self.resting_hr,
            strain: self.strain,
            meal_type: self.meal_type,
            notes: self.notes,
        })
    }
}

/// Parse tracker CSV from any reader
pub fn parse_tracker_csv<R: Read>(input: R) -> Result<RecordSet, HealthError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| HealthError::MissingHeader(e.to_string()))?
        .clone();
    if headers.is_empty() || !headers.iter().any(|h| h == "date") {
        return Err(HealthError::MissingHeader(
            "expected a 'date' column".to_string(),
        ));
    }

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (index, result) in reader.records().enumerate() {
        // Header occupies line 1
        let fallback_line = index as u64 + 2;

        let (line, outcome) = match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
                let outcome = record
                    .deserialize::<TrackerRow>(Some(&headers))
                    .map_err(|e| e.to_string())
                    .and_then(TrackerRow::into_record);
                (line, outcome)
            }
            Err(e) => (
                e.position().map(|p| p.line()).unwrap_or(fallback_line),
                Err(e.to_string()),
            ),
        };

        match outcome {
            Ok(record) => rows.push(record),
            Err(reason) => {
                tracing::warn!(line, reason = %reason, "skipping malformed tracker row");
                skipped.push(SkippedRow { line, reason });
            }
        }
    }

    Ok(RecordSet {
        records: into_daily_records(rows),
        skipped,
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Blank, unparseable or non-finite numbers become absent
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
