//! Exporter port: Trait for delivering records to an external collector.
//!
//! This trait abstracts the export transport (HTTP endpoint, database) from
//! the application logic.

use crate::domain::ScoringRecord;

/// Errors that can occur while delivering a record.
///
/// Delivery failures are recoverable: the score and tier computed before
/// delivery remain valid.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Collector answered with HTTP status {0}")]
    Status(u16),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Record rejected by collector: {0}")]
    Rejected(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for record delivery.
///
/// Each call delivers at most once; implementations do not retry.
pub trait Exporter: Send + Sync {
    /// Short name of the export target, for logs.
    fn target(&self) -> &str;

    /// Deliver one record.
    ///
    /// # Errors
    /// Returns `DeliveryError` if the collector did not accept the record.
    fn deliver(&self, record: &ScoringRecord) -> Result<(), DeliveryError>;
}
