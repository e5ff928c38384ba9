//! Pipeline orchestration
//!
//! This module provides the public API for trmnl-health.
//! It orchestrates the full pipeline from tracker file to dashboard payload.

use crate::config::Settings;
use crate::error::HealthError;
use crate::metrics::{MetricsConfig, MetricsEngine};
use crate::payload::{BuiltPayload, PayloadBuilder, PayloadConfig};
use crate::sources::{CsvTrackerSource, RecordSource, SkippedRow};
use crate::types::MetricsSummary;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::Path;

/// Build the dashboard payload for a tracker CSV file.
///
/// # Arguments
/// * `csv_path` - Tracker spreadsheet exported as CSV
/// * `settings` - Targets, window and payload limits
/// * `now` - Generation time; also decides "today" in the configured timezone
///
/// # Example
/// ```ignore
/// let settings = Settings::from_env()?;
/// let run = tracker_csv_to_payload(&settings.csv_path, &settings, Utc::now())?;
/// println!("{}", serde_json::to_string_pretty(&run.built.payload)?);
/// ```
pub fn tracker_csv_to_payload(
    csv_path: &Path,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<DashboardRun, HealthError> {
    let source = CsvTrackerSource::new(csv_path);
    DashboardPipeline::from_settings(settings).run(&source, now)
}

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct DashboardRun {
    pub summary: MetricsSummary,
    pub built: BuiltPayload,
    /// Rows the loader could not parse
    pub skipped: Vec<SkippedRow>,
}

/// Load → summarize → build, with fixed configuration.
///
/// Pipeline stages:
/// 1. RecordSource - Parse tracker rows into ordered daily records
/// 2. MetricsEngine - Compute windows, goal projection and compliance
/// 3. PayloadBuilder - Shape cards and fit them to the size ceiling
#[derive(Debug, Clone)]
pub struct DashboardPipeline {
    engine: MetricsEngine,
    builder: PayloadBuilder,
    timezone: Tz,
}

impl Default for DashboardPipeline {
    fn default() -> Self {
        Self::new(MetricsConfig::default(), PayloadConfig::default())
    }
}

impl DashboardPipeline {
    pub fn new(metrics: MetricsConfig, payload: PayloadConfig) -> Self {
        Self {
            timezone: payload.timezone,
            engine: MetricsEngine::new(metrics),
            builder: PayloadBuilder::new(payload),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.metrics_config(), settings.payload_config())
    }

    /// Run every stage against `source`
    pub fn run(
        &self,
        source: &dyn RecordSource,
        now: DateTime<Utc>,
    ) -> Result<DashboardRun, HealthError> {
        // Stage 1: Load records
        let loaded = source.load()?;
        if !loaded.skipped.is_empty() {
            tracing::warn!(count = loaded.skipped.len(), "skipped unparseable tracker rows");
        }

        // Stage 2: Summarize as of the local date
        let today = now.with_timezone(&self.timezone).date_naive();
        let summary = self.engine.summarize(&loaded.records, today);

        // Stage 3: Build the size-bounded payload
        let built = self.builder.build(&summary, now)?;
        tracing::info!(
            records = loaded.records.len(),
            size = built.size,
            dropped = built.dropped.len(),
            "built dashboard payload"
        );

        Ok(DashboardRun {
            summary,
            built,
            skipped: loaded.skipped,
        })
    }
}
