//! Receipt field extraction via Azure Document Intelligence
//!
//! Sends the raw image to the `prebuilt-receipt` model, polls the long-running
//! operation, and keeps the string-valued fields and line-item rows of the
//! first recognized document. The result carries no geometry.
//!
//! Extraction is advisory: [`ReceiptExtractor::extract`] never fails and
//! returns an empty [`Extraction`] on any error. Use
//! [`ReceiptExtractor::try_extract`] to see the error.
//!
//! # Example
//! ```no_run
//! use receipt_cloud_extraction::{CloudExtractionConfig, ReceiptExtractor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CloudExtractionConfig::new("https://example.cognitiveservices.azure.com", "key");
//! let extractor = ReceiptExtractor::new(config)?;
//!
//! let bytes = std::fs::read("receipt.jpg")?;
//! let extraction = extractor.extract(&bytes).await;
//! println!("{:?}", extraction.fields.get("MerchantName"));
//! # Ok(())
//! # }
//! ```

mod response;

use receipt_common::{Extraction, SourceError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use response::parse_analyze_result;

/// Header carrying the subscription key
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
/// Header pointing at the long-running operation
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// Connection and polling settings for the Document Intelligence service
#[derive(Debug, Clone)]
pub struct CloudExtractionConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`
    pub endpoint: String,
    /// Subscription key
    pub api_key: String,
    /// Prebuilt model to run
    pub model_id: String,
    /// REST API version
    pub api_version: String,
    /// Delay between operation status polls
    pub poll_interval: Duration,
    /// Give up after this many status polls
    pub max_polls: usize,
    /// Timeout for each individual HTTP request
    pub request_timeout: Duration,
}

impl Default for CloudExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: "prebuilt-receipt".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval: Duration::from_secs(1),
            max_polls: 60,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CloudExtractionConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Both the endpoint and the key are set
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// URL of the analyze operation
    #[must_use]
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.model_id,
            self.api_version
        )
    }
}

/// Cloud extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Cloud extraction not configured (endpoint and key are required)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("No Operation-Location in analyze response")]
    MissingOperationLocation,

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Analysis did not finish after {0} polls")]
    PollsExhausted(usize),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<ExtractionError> for SourceError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Http(e) => SourceError::Transport(e.to_string()),
            ExtractionError::Malformed(_) | ExtractionError::MissingOperationLocation => {
                SourceError::Parse(err.to_string())
            }
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}

/// Client for the `prebuilt-receipt` analyze operation
#[derive(Debug, Clone)]
pub struct ReceiptExtractor {
    client: Client,
    config: CloudExtractionConfig,
}

impl ReceiptExtractor {
    /// Create an extractor with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::NotConfigured` if the endpoint or key is blank.
    pub fn new(config: CloudExtractionConfig) -> Result<Self, ExtractionError> {
        if !config.is_configured() {
            return Err(ExtractionError::NotConfigured);
        }
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &CloudExtractionConfig {
        &self.config
    }

    /// Extract fields, returning an empty extraction on any failure
    pub async fn extract(&self, image: &[u8]) -> Extraction {
        match self.try_extract(image).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Cloud extraction failed: {}", e);
                Extraction::default()
            }
        }
    }

    /// Extract fields, surfacing the failure
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, a failed
    /// analysis, a poll limit overrun, or an unreadable response body.
    pub async fn try_extract(&self, image: &[u8]) -> Result<Extraction, ExtractionError> {
        let operation_url = self.submit(image).await?;
        debug!("Polling analyze operation at {}", operation_url);

        for attempt in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .client
                .get(&operation_url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .send()
                .await?;
            let response = ensure_success(response).await?;

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ExtractionError::Malformed(format!("Invalid JSON: {e}")))?;

            match body.get("status").and_then(|s| s.as_str()).unwrap_or("") {
                "succeeded" => {
                    let result = body.get("analyzeResult").ok_or_else(|| {
                        ExtractionError::Malformed("No analyzeResult".to_string())
                    })?;
                    let extraction = parse_analyze_result(result)?;
                    info!(
                        "Cloud extracted {} fields and {} items after {} polls",
                        extraction.fields.len(),
                        extraction.items.len(),
                        attempt
                    );
                    return Ok(extraction);
                }
                "failed" => {
                    let message = body
                        .get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error");
                    return Err(ExtractionError::AnalysisFailed(message.to_string()));
                }
                status => debug!("Analyze operation status {:?} (poll {})", status, attempt),
            }
        }

        Err(ExtractionError::PollsExhausted(self.config.max_polls))
    }

    /// Start the analysis, returning the operation URL to poll
    async fn submit(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(self.config.analyze_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;
        let response = ensure_success(response).await?;

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or(ExtractionError::MissingOperationLocation)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ExtractionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExtractionError::Status { status, body })
}
