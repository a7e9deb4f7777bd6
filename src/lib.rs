//! # Delirisk
//!
//! Delirium risk scoring pipeline for hospital intake.
//!
//! This crate provides:
//! - Validation and assembly of clinical inputs into a model-ordered feature vector
//! - Scoring against a persisted binary classifier and three-tier risk classification
//! - Uniquely identified scoring records exported to an HTTP collector or SQLite
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (feature catalog, patient input, vectors, tiers, records)
//! - `ports`: Trait definitions for the classifier and the export target
//! - `adapters`: Concrete implementations (model artifacts, reqwest, SQLite, forms)
//! - `application`: The scoring service orchestrating domain and ports
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{FeatureCatalog, FeatureVector, PatientInput, RiskTier, ScoringRecord};

/// Result type for Delirisk operations
pub type Result<T> = std::result::Result<T, DeliriskError>;

/// Main error type for Delirisk
#[derive(Debug, thiserror::Error)]
pub enum DeliriskError {
    #[error("Invalid patient data: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error(transparent)]
    Record(#[from] domain::RecordError),

    #[error("Feature assembly failed: {0}")]
    Assembly(#[from] domain::AssemblyError),

    #[error("Invalid feature catalog: {0}")]
    Catalog(#[from] domain::CatalogError),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ports::ScoringError),

    #[error("Export failed: {0}")]
    Delivery(#[from] ports::DeliveryError),

    #[error("Model artifacts unusable: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Form(#[from] adapters::form::FormError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
