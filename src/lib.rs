//! trmnl-health - Health tracker metrics for TRMNL e-ink dashboards
//!
//! Reads a personal health-tracking CSV, computes rolling metrics and goal
//! projections, and publishes a size-bounded card payload to a TRMNL private
//! plugin through a deterministic pipeline: record loading → metrics
//! summary → payload building → deduplicated publish.
//!
//! ## Modules
//!
//! - **Sources**: Parse tracker rows into one record per day
//! - **Metrics**: Rolling windows, goal projection and macro compliance
//! - **Payload**: Dashboard cards fitted to the webhook size limit
//! - **Publisher**: Content hashing, state tracking and webhook delivery

pub mod client;
pub mod config;
pub mod error;
pub mod goal;
pub mod metrics;
pub mod payload;
pub mod pipeline;
pub mod publisher;
pub mod sources;
pub mod state;
pub mod types;
pub mod window;

pub use config::Settings;
pub use error::HealthError;
pub use metrics::{MetricsConfig, MetricsEngine};
pub use payload::{BuiltPayload, PayloadBuilder, PayloadConfig};
pub use pipeline::{tracker_csv_to_payload, DashboardPipeline, DashboardRun};
pub use publisher::{payload_hash, PublishOptions, PublishOutcome, Publisher};
pub use sources::{CsvTrackerSource, RecordSource};
pub use types::{DailyRecord, MetricsSummary, Payload};

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
