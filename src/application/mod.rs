//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the scoring event end to end.

mod scoring;

pub use scoring::{Assessment, DeliveryStatus, ScoringOutcome, ScoringService};
