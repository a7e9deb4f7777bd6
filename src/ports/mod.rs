//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the scoring pipeline and external systems (model artifact,
//! export collector).

mod classifier;
mod exporter;

pub use classifier::{Classifier, ScoringError};
pub use exporter::{DeliveryError, Exporter};
