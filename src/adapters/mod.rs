//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external systems:
//! - `model`: persisted model artifacts and the `Classifier` implementation
//! - `http`: reqwest-based HTTP collector export
//! - `sqlite`: SQLite record export
//! - `form`: JSON form submissions
//! - `sanitize`: identifier filtering for logs

pub mod form;
pub mod http;
pub mod model;
pub mod sanitize;
pub mod sqlite;

pub use model::ArtifactError;
pub use sqlite::StorageError;
