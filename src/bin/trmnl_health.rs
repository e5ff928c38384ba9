//! trmnl-health CLI - Push tracker metrics to a TRMNL dashboard
//!
//! Commands:
//! - publish: Build the payload from the tracker CSV and send it if changed
//! - current-screen: Show what the TRMNL device is currently displaying

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::process::ExitCode;

use trmnl_health::client::TrmnlClient;
use trmnl_health::config::{expand_tilde, ScreenSettings, Settings};
use trmnl_health::pipeline::tracker_csv_to_payload;
use trmnl_health::publisher::{PublishOptions, PublishOutcome, Publisher};
use trmnl_health::state::FileStateStore;
use trmnl_health::{HealthError, VERSION};

/// trmnl-health - Health tracker metrics for TRMNL e-ink dashboards
#[derive(Parser)]
#[command(name = "trmnl-health")]
#[command(version = VERSION)]
#[command(about = "Publish health tracker metrics to a TRMNL private plugin", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dashboard payload and send it to the plugin webhook
    Publish {
        /// Lookback window in days (overrides LOOKBACK_DAYS)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3650))]
        lookback_days: Option<u32>,

        /// Tracker CSV path (overrides TRACKER_CSV_PATH)
        #[arg(long)]
        csv: Option<String>,

        /// Print the request body without checking state or sending
        #[arg(long)]
        dry_run: bool,

        /// Print the payload before sending
        #[arg(long)]
        show_payload: bool,

        /// Send even if the payload is unchanged since the last publish
        #[arg(long)]
        force: bool,
    },

    /// Fetch the screen currently shown on the device
    CurrentScreen,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HealthCliError> {
    match cli.command {
        Commands::Publish {
            lookback_days,
            csv,
            dry_run,
            show_payload,
            force,
        } => cmd_publish(
            lookback_days,
            csv,
            PublishOptions { force, dry_run },
            show_payload,
        ),

        Commands::CurrentScreen => cmd_current_screen(),
    }
}

fn cmd_publish(
    lookback_days: Option<u32>,
    csv: Option<String>,
    options: PublishOptions,
    show_payload: bool,
) -> Result<(), HealthCliError> {
    // Configuration problems surface before the tracker file is touched
    let mut settings = Settings::from_env()?;
    if let Some(days) = lookback_days {
        settings.lookback_days = days as usize;
    }
    if let Some(path) = csv {
        settings.csv_path = expand_tilde(&path);
    }
    let plugin_url = if options.dry_run {
        None
    } else {
        Some(settings.require_plugin_url()?.to_string())
    };

    let now = chrono::Utc::now();
    let run = tracker_csv_to_payload(&settings.csv_path, &settings, now)?;

    let mut stdout = io::stdout().lock();
    if show_payload && !options.dry_run {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&run.built.payload)?)?;
    }

    let mut client = TrmnlClient::new(settings.http_timeout)?;
    if let Some(url) = plugin_url {
        client = client.with_plugin_url(url);
    }
    let publisher = Publisher::new(FileStateStore::new(&settings.state_path), client);

    let report = match publisher.publish(&run.built.payload, options, now)? {
        PublishOutcome::DryRun { hash, body } => {
            writeln!(stdout, "{body}")?;
            PublishReport::new("dry_run", hash, None)
        }
        PublishOutcome::Unchanged { hash } => PublishReport::new("unchanged", hash, None),
        PublishOutcome::Sent { hash, response } => {
            PublishReport::new("sent", hash, Some(serde_json::to_value(response)?))
        }
    }
    .with_payload_stats(run.built.size, &run.built.dropped, run.skipped.len());

    writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn cmd_current_screen() -> Result<(), HealthCliError> {
    let settings = ScreenSettings::from_env()?;
    let client = TrmnlClient::new(settings.http_timeout)?
        .with_api_base(settings.api_base)
        .with_device_api_key(settings.device_api_key);

    let screen = client.current_screen()?;
    writeln!(io::stdout().lock(), "{}", serde_json::to_string_pretty(&screen)?)?;
    Ok(())
}

// Report types

#[derive(serde::Serialize)]
struct PublishReport {
    status: &'static str,
    payload_hash: String,
    payload_bytes: usize,
    dropped_cards: Vec<String>,
    skipped_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<serde_json::Value>,
}

impl PublishReport {
    fn new(status: &'static str, payload_hash: String, response: Option<serde_json::Value>) -> Self {
        Self {
            status,
            payload_hash,
            payload_bytes: 0,
            dropped_cards: Vec::new(),
            skipped_rows: 0,
            response,
        }
    }

    fn with_payload_stats(
        mut self,
        size: usize,
        dropped: &[trmnl_health::types::CardId],
        skipped_rows: usize,
    ) -> Self {
        self.payload_bytes = size;
        self.dropped_cards = dropped.iter().map(|id| id.to_string()).collect();
        self.skipped_rows = skipped_rows;
        self
    }
}

// Error types

#[derive(Debug)]
enum HealthCliError {
    Io(io::Error),
    Health(HealthError),
    Json(serde_json::Error),
}

impl From<io::Error> for HealthCliError {
    fn from(e: io::Error) -> Self {
        HealthCliError::Io(e)
    }
}

impl From<HealthError> for HealthCliError {
    fn from(e: HealthError) -> Self {
        HealthCliError::Health(e)
    }
}

impl From<serde_json::Error> for HealthCliError {
    fn from(e: serde_json::Error) -> Self {
        HealthCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<HealthCliError> for CliError {
    fn from(e: HealthCliError) -> Self {
        match e {
            HealthCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check that stdout is writable")
            }
            HealthCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Report this as a bug"),
            HealthCliError::Health(e) => {
                let message = e.to_string();
                let (code, hint) = match e {
                    HealthError::SourceUnavailable { .. } => (
                        "SOURCE_UNAVAILABLE",
                        "Set TRACKER_CSV_PATH or pass --csv with a readable file",
                    ),
                    HealthError::MissingHeader(_) => {
                        ("MISSING_HEADER", "The first CSV line must contain a 'date' column")
                    }
                    HealthError::Csv(_) => ("CSV_ERROR", "Check the tracker file encoding and quoting"),
                    HealthError::ConfigMissing(_) => {
                        ("CONFIG_MISSING", "Export the variable named in the message")
                    }
                    HealthError::InvalidConfig { .. } => {
                        ("INVALID_CONFIG", "Fix the environment variable named in the message")
                    }
                    HealthError::InvalidTimezone(_) => (
                        "INVALID_TIMEZONE",
                        "Use an IANA name such as Europe/London for LOCAL_TIMEZONE",
                    ),
                    HealthError::JsonError(_) => ("JSON_ERROR", "Report this as a bug"),
                    HealthError::PayloadTooLarge { .. } => (
                        "PAYLOAD_TOO_LARGE",
                        "Raise PAYLOAD_MAX_BYTES or shorten the pinned cards",
                    ),
                    HealthError::Network(_) => {
                        ("NETWORK_ERROR", "Check connectivity or raise HTTP_TIMEOUT_SECS")
                    }
                    HealthError::HttpStatus { .. } => {
                        ("HTTP_STATUS", "Check TRMNL_PLUGIN_URL and the device API key")
                    }
                    HealthError::StateIo { .. } => {
                        ("STATE_IO", "Check permissions on the state file or set TRMNL_STATE_PATH")
                    }
                };
                CliError::new(code, message, hint)
            }
        }
    }
}
