//! TRMNL HTTP client

use crate::error::HealthError;
use crate::publisher::MergeVariables;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Public TRMNL API host
pub const DEFAULT_API_BASE: &str = "https://usetrmnl.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted request timeout
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Response of a successful (2xx) request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    Json(Value),
    Text { status: u16, body: String },
}

/// Delivers a merge-variables body to the plugin webhook
pub trait WebhookTransport {
    /// POST `body`; non-2xx responses are errors
    fn post(&self, body: &MergeVariables<'_>) -> Result<WebhookResponse, HealthError>;
}

/// Blocking reqwest client for the TRMNL webhook and device API
#[derive(Debug, Clone)]
pub struct TrmnlClient {
    http: reqwest::blocking::Client,
    plugin_url: Option<String>,
    device_api_key: Option<String>,
    api_base: String,
}

impl TrmnlClient {
    pub fn new(timeout: Duration) -> Result<Self, HealthError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout.min(MAX_TIMEOUT))
            .user_agent(concat!("trmnl-health/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            plugin_url: None,
            device_api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_plugin_url(mut self, url: impl Into<String>) -> Self {
        self.plugin_url = Some(url.into());
        self
    }

    pub fn with_device_api_key(mut self, key: impl Into<String>) -> Self {
        self.device_api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Endpoint for the device's current screen
    pub fn current_screen_url(&self) -> String {
        format!("{}/api/current_screen", self.api_base.trim_end_matches('/'))
    }

    /// Fetch what the device is currently showing
    pub fn current_screen(&self) -> Result<Value, HealthError> {
        let key = self
            .device_api_key
            .as_deref()
            .ok_or_else(|| HealthError::ConfigMissing("TRMNL_DEVICE_API_KEY".to_string()))?;

        let url = self.current_screen_url();
        tracing::debug!(%url, "fetching current screen");
        let response = self.http.get(&url).header("access-token", key).send()?;

        match interpret_response(response.status().as_u16(), response.text()?)? {
            WebhookResponse::Json(value) => Ok(value),
            WebhookResponse::Text { body, .. } => Ok(Value::String(body)),
        }
    }
}

impl WebhookTransport for TrmnlClient {
    fn post(&self, body: &MergeVariables<'_>) -> Result<WebhookResponse, HealthError> {
        let url = self
            .plugin_url
            .as_deref()
            .ok_or_else(|| HealthError::ConfigMissing("TRMNL_PLUGIN_URL".to_string()))?;

        let response = self.http.post(url).json(body).send()?;
        let status = response.status().as_u16();
        tracing::debug!(status, "webhook responded");
        interpret_response(status, response.text()?)
    }
}

/// Classify a raw HTTP response
fn interpret_response(status: u16, body: String) -> Result<WebhookResponse, HealthError> {
    if !(200..300).contains(&status) {
        return Err(HealthError::HttpStatus { status, body });
    }
    match serde_json::from_str(&body) {
        Ok(value) => Ok(WebhookResponse::Json(value)),
        Err(_) => Ok(WebhookResponse::Text { status, body }),
    }
}
