//! Time-entity recognition boundary: the `TimeRecognizer` trait the pipeline
//! consumes plus the Duckling-style HTTP implementation. Recognition is best
//! effort; failures degrade to a sentence without time entities.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Bounded wait for recognition, applied both by the HTTP client and by the
/// pipeline's merge step.
pub const RECOGNITION_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// One recognized span over the sentence. Offsets are char indices into the
/// original text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSpan {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub dim: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub value: TimeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeValue {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub grain: String,
    #[serde(default)]
    pub from: Option<TimeBoundValue>,
    #[serde(default)]
    pub to: Option<TimeBoundValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeBoundValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub grain: String,
}

impl TimeSpan {
    /// Usable when the dimension is time and the value carries at least one
    /// RFC3339-parsable timestamp (either bound is enough for intervals).
    pub fn is_valid(&self) -> bool {
        if self.dim != "time" {
            return false;
        }
        match self.value.kind.as_str() {
            "value" => parse_rfc3339(&self.value.value).is_some(),
            "interval" => {
                let from_ok = self.value.from.as_ref().map_or(false, |b| parse_rfc3339(&b.value).is_some());
                let to_ok = self.value.to.as_ref().map_or(false, |b| parse_rfc3339(&b.value).is_some());
                from_ok || to_ok
            }
            _ => false,
        }
    }
}

pub(crate) fn parse_rfc3339(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Boundary to the external recognition service.
#[async_trait]
pub trait TimeRecognizer: Send + Sync + 'static {
    async fn parse(&self, text: &str) -> anyhow::Result<Vec<TimeSpan>>;
}

/// Duckling-style HTTP recognizer: form-encoded POST of the sentence to
/// `<base>/parse`, JSON array response.
pub struct DucklingClient {
    base: String,
    client: reqwest::Client,
}

impl DucklingClient {
    pub fn new(base: impl Into<String>) -> anyhow::Result<DucklingClient> {
        let client = reqwest::Client::builder()
            .timeout(RECOGNITION_TIMEOUT)
            .build()
            .context("building recognition http client")?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(DucklingClient { base, client })
    }

    /// Base URL from `DUCKLING_SERVER`, defaulting to localhost.
    pub fn from_env() -> anyhow::Result<DucklingClient> {
        let base = std::env::var("DUCKLING_SERVER").unwrap_or_else(|_| DEFAULT_SERVICE_URL.to_string());
        DucklingClient::new(base)
    }
}

#[async_trait]
impl TimeRecognizer for DucklingClient {
    async fn parse(&self, text: &str) -> anyhow::Result<Vec<TimeSpan>> {
        let url = format!("{}/parse", self.base);
        let resp = self
            .client
            .post(&url)
            .form(&[("text", text)])
            .send()
            .await
            .with_context(|| format!("posting to {url}"))?
            .error_for_status()
            .context("recognition service returned an error status")?;
        let spans: Vec<TimeSpan> = resp.json().await.context("decoding recognition response")?;
        Ok(spans)
    }
}
