//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O. The catalog, vector assembler, risk tiers
//! and record builder live here.

mod catalog;
mod patient;
mod record;
mod risk;
mod vector;

pub use catalog::{CatalogError, FeatureCatalog, DIAGNOSIS_MARKER};
pub use patient::{
    PatientInput, RawInputBundle, ValidationError, AGE_FIELD, AGE_RANGE, BILIRUBIN_FIELD,
    BILIRUBIN_RANGE, SODIUM_FIELD, SODIUM_RANGE,
};
pub use record::{require_case_identifier, RecordError, ScoringRecord, TIMESTAMP_FORMAT};
pub use risk::{RiskTier, HIGH_THRESHOLD, MODERATE_THRESHOLD};
pub use vector::{assemble, AssemblyError, FeatureVector};
