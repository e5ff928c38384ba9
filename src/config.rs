//! Settings loaded from environment variables
//!
//! Every setting is read through a lookup function, so tests can pass a map
//! instead of touching the process environment.

use crate::client::{DEFAULT_API_BASE, DEFAULT_TIMEOUT, MAX_TIMEOUT};
use crate::error::HealthError;
use crate::metrics::{MacroTargets, MetricsConfig};
use crate::payload::{PayloadConfig, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::state::default_state_path;
use crate::types::CardId;
use crate::window::{DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CSV_PATH: &str = "~/weight-loss-tracker.csv";
const DEFAULT_TARGET_WEIGHT_KG: f64 = 70.0;

/// Everything a publish run needs
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub plugin_url: Option<String>,
    pub device_api_key: Option<String>,
    pub api_base: String,
    pub csv_path: PathBuf,
    pub state_path: PathBuf,
    pub timezone: Tz,
    pub lookback_days: usize,
    pub target_weight: f64,
    pub start_weight: Option<f64>,
    pub macro_targets: MacroTargets,
    pub max_payload_bytes: usize,
    pub card_priority: Vec<CardId>,
    pub http_timeout: Duration,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the raw value of a variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HealthError> {
        let defaults = MacroTargets::default();
        let macro_targets = MacroTargets {
            calories_min: optional_number(&lookup, "CALORIES_MIN", defaults.calories_min)?,
            calories_max: optional_number(&lookup, "CALORIES_MAX", defaults.calories_max)?,
            protein_g: optional_number(&lookup, "PROTEIN_TARGET_G", defaults.protein_g)?,
            carbs_g: optional_number(&lookup, "CARB_TARGET_G", defaults.carbs_g)?,
            fat_g: optional_number(&lookup, "FAT_TARGET_G", defaults.fat_g)?,
            tolerance_pct: number(&lookup, "MACRO_TOLERANCE_PCT", defaults.tolerance_pct)?,
        };
        if macro_targets.tolerance_pct < 0.0 {
            return Err(HealthError::invalid_config("MACRO_TOLERANCE_PCT", "must not be negative"));
        }
        if let (Some(min), Some(max)) = (macro_targets.calories_min, macro_targets.calories_max) {
            if min > max {
                return Err(HealthError::invalid_config(
                    "CALORIES_MIN",
                    format!("{min} is above CALORIES_MAX ({max})"),
                ));
            }
        }

        let target_weight = number(&lookup, "TARGET_WEIGHT_KG", DEFAULT_TARGET_WEIGHT_KG)?;
        if target_weight <= 0.0 {
            return Err(HealthError::invalid_config("TARGET_WEIGHT_KG", "must be positive"));
        }

        let lookback_days = number(&lookup, "LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?;
        if lookback_days == 0 {
            return Err(HealthError::invalid_config("LOOKBACK_DAYS", "must be at least 1"));
        }
        if lookback_days > MAX_LOOKBACK_DAYS {
            return Err(HealthError::invalid_config(
                "LOOKBACK_DAYS",
                format!("must be at most {MAX_LOOKBACK_DAYS}"),
            ));
        }

        let max_payload_bytes = number(&lookup, "PAYLOAD_MAX_BYTES", DEFAULT_MAX_PAYLOAD_BYTES)?;
        if max_payload_bytes == 0 {
            return Err(HealthError::invalid_config("PAYLOAD_MAX_BYTES", "must be positive"));
        }

        let settings = Self {
            plugin_url: value(&lookup, "TRMNL_PLUGIN_URL"),
            device_api_key: value(&lookup, "TRMNL_DEVICE_API_KEY"),
            api_base: value(&lookup, "TRMNL_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            csv_path: expand_tilde(
                &value(&lookup, "TRACKER_CSV_PATH").unwrap_or_else(|| DEFAULT_CSV_PATH.to_string()),
            ),
            state_path: value(&lookup, "TRMNL_STATE_PATH")
                .map(|p| expand_tilde(&p))
                .unwrap_or_else(default_state_path),
            timezone: parse_timezone(value(&lookup, "LOCAL_TIMEZONE").as_deref().unwrap_or("UTC"))?,
            lookback_days,
            target_weight,
            start_weight: optional_number(&lookup, "STARTING_WEIGHT_KG", None)?,
            macro_targets,
            max_payload_bytes,
            card_priority: parse_card_priority(value(&lookup, "CARD_PRIORITY").as_deref())?,
            http_timeout: timeout(&lookup)?,
        };

        tracing::debug!(
            csv = %settings.csv_path.display(),
            timezone = %settings.timezone,
            lookback_days,
            "loaded settings"
        );
        Ok(settings)
    }

    /// Webhook URL, required before publishing
    pub fn require_plugin_url(&self) -> Result<&str, HealthError> {
        self.plugin_url
            .as_deref()
            .ok_or_else(|| HealthError::ConfigMissing("TRMNL_PLUGIN_URL".to_string()))
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            lookback_days: self.lookback_days,
            target_weight: self.target_weight,
            start_weight_override: self.start_weight,
            macro_targets: self.macro_targets.clone(),
        }
    }

    pub fn payload_config(&self) -> PayloadConfig {
        PayloadConfig {
            max_bytes: self.max_payload_bytes,
            card_priority: self.card_priority.clone(),
            timezone: self.timezone,
            macro_targets: self.macro_targets.clone(),
        }
    }
}

/// Settings for the current-screen lookup, which needs only the device key
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSettings {
    pub device_api_key: String,
    pub api_base: String,
    pub http_timeout: Duration,
}

impl ScreenSettings {
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HealthError> {
        Ok(Self {
            device_api_key: value(&lookup, "TRMNL_DEVICE_API_KEY")
                .ok_or_else(|| HealthError::ConfigMissing("TRMNL_DEVICE_API_KEY".to_string()))?,
            api_base: value(&lookup, "TRMNL_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http_timeout: timeout(&lookup)?,
        })
    }
}

/// Trimmed value; blank counts as unset
fn value(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, HealthError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| HealthError::invalid_config(key, format!("'{raw}': {e}")))
}

fn number<T: FromStr + NumberCheck>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, HealthError>
where
    T::Err: std::fmt::Display,
{
    match value(lookup, key) {
        Some(raw) => {
            let parsed: T = parse_value(key, &raw)?;
            if !parsed.is_valid() {
                return Err(HealthError::invalid_config(key, format!("'{raw}' is not finite")));
            }
            Ok(parsed)
        }
        None => Ok(default),
    }
}

/// Unset keeps `default`; set to an empty string disables the target
fn optional_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<f64>,
) -> Result<Option<f64>, HealthError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(_) => number(lookup, key, 0.0).map(Some),
    }
}

trait NumberCheck {
    fn is_valid(&self) -> bool;
}

impl NumberCheck for f64 {
    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}

impl NumberCheck for usize {
    fn is_valid(&self) -> bool {
        true
    }
}

impl NumberCheck for u64 {
    fn is_valid(&self) -> bool {
        true
    }
}

fn timeout(lookup: &impl Fn(&str) -> Option<String>) -> Result<Duration, HealthError> {
    let secs = number(lookup, "HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
    if secs == 0 {
        return Err(HealthError::invalid_config("HTTP_TIMEOUT_SECS", "must be positive"));
    }
    if secs > MAX_TIMEOUT.as_secs() {
        return Err(HealthError::invalid_config(
            "HTTP_TIMEOUT_SECS",
            format!("must be at most {}", MAX_TIMEOUT.as_secs()),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_timezone(name: &str) -> Result<Tz, HealthError> {
    name.parse::<Tz>()
        .map_err(|_| HealthError::InvalidTimezone(name.to_string()))
}

/// Comma-separated card ids, most important first
fn parse_card_priority(raw: Option<&str>) -> Result<Vec<CardId>, HealthError> {
    let Some(raw) = raw else {
        return Ok(CardId::ALL.to_vec());
    };

    let mut order = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let id: CardId = name
            .parse()
            .map_err(|e: String| HealthError::invalid_config("CARD_PRIORITY", e))?;
        if order.contains(&id) {
            return Err(HealthError::invalid_config(
                "CARD_PRIORITY",
                format!("card '{id}' listed twice"),
            ));
        }
        order.push(id);
    }

    if order.is_empty() {
        return Ok(CardId::ALL.to_vec());
    }
    Ok(order)
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}
