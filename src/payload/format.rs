//! Value formatting for dashboard cards

use chrono::NaiveDate;

/// Rendered in place of an absent metric
pub const PLACEHOLDER: &str = "—";

/// Differences smaller than this read as "flat"
const FLAT_THRESHOLD: f64 = 0.05;

fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // Avoid rendering "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// `78.5 kg`, or the placeholder when absent
pub fn number(value: Option<f64>, unit: &str, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}{unit}", precision, round_to(v, precision)),
        None => PLACEHOLDER.to_string(),
    }
}

/// Like [`number`] but with an explicit `+` on positive values
pub fn signed(value: Option<f64>, unit: &str, precision: usize) -> String {
    match value {
        Some(v) => {
            let rounded = round_to(v, precision);
            let sign = if rounded > 0.0 { "+" } else { "" };
            format!("{sign}{:.*}{unit}", precision, rounded)
        }
        None => PLACEHOLDER.to_string(),
    }
}

/// Whole percent
pub fn percent(value: Option<f64>) -> String {
    number(value, "%", 0)
}

/// Where a value sits relative to an inclusive band
pub fn band_badge(value: Option<f64>, band: Option<(f64, f64)>) -> &'static str {
    match (value, band) {
        (None, _) => "No data",
        (Some(_), None) => "No target",
        (Some(v), Some((low, _))) if v < low => "Low",
        (Some(v), Some((_, high))) if v > high => "High",
        _ => "On target",
    }
}

/// Direction of `latest` relative to `reference`: `flat`, `up 0.4 h`, `down 3 ms`
pub fn trend(latest: Option<f64>, reference: Option<f64>, unit: &str, precision: usize) -> String {
    let (Some(latest), Some(reference)) = (latest, reference) else {
        return PLACEHOLDER.to_string();
    };
    let delta = latest - reference;
    if delta.abs() < FLAT_THRESHOLD {
        return "flat".to_string();
    }
    let direction = if delta > 0.0 { "up" } else { "down" };
    format!("{direction} {}", number(Some(delta.abs()), unit, precision))
}

/// `Thu Mar 07`
pub fn short_date(date: NaiveDate) -> String {
    date.format("%a %b %d").to_string()
}

/// `today`, `yesterday`, `3 days ago`
pub fn staleness(days: i64) -> String {
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d => format!("{d} days ago"),
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
