//! HTTP adapter: Implementation of Exporter over a blocking HTTP POST.
//!
//! Each record is posted once as a flat JSON object. Any 2xx answer counts as
//! delivered; everything else is reported to the caller. There is no retry.

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;

use crate::domain::ScoringRecord;
use crate::ports::{DeliveryError, Exporter};

/// Posts scoring records to a configured collector endpoint.
pub struct HttpExporter {
    http: HttpClient,
    url: String,
}

impl HttpExporter {
    /// Create an exporter for `url`.
    ///
    /// `timeout` bounds each request end to end; `None` waits for the
    /// collector indefinitely.
    ///
    /// # Errors
    /// Returns `DeliveryError::Transport` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, DeliveryError> {
        let url = url.into();
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::info!("HTTP exporter configured (timeout={:?})", timeout);
        Ok(Self { http, url })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Exporter for HttpExporter {
    fn target(&self) -> &str {
        "http"
    }

    fn deliver(&self, record: &ScoringRecord) -> Result<(), DeliveryError> {
        let payload = record.to_payload()?;

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Collector rejected record with status {}", status.as_u16());
            return Err(DeliveryError::Status(status.as_u16()));
        }

        tracing::debug!("Record {} delivered", record.unique_identifier());
        Ok(())
    }
}
