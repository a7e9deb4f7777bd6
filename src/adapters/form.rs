//! Form adapter: reads caller input submitted as JSON.
//!
//! Stands in for the interactive form. A submission looks like:
//!
//! ```json
//! {"mrn": 12345, "age": 70, "sodium": 140.0, "bilirubin": 1.5, "diagnoses": ["Dementia"]}
//! ```

use std::io::Read;
use std::path::Path;

use crate::domain::{FeatureCatalog, PatientInput};

/// Error type for reading a form submission.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Failed to read form submission: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed form submission: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse a submission from any reader (file, stdin).
///
/// # Errors
/// Returns `FormError` if the input cannot be read or is not a valid submission.
pub fn read_submission<R: Read>(reader: R) -> Result<PatientInput, FormError> {
    let input: PatientInput = serde_json::from_reader(reader)?;
    tracing::debug!(
        "Read form submission with {} selected diagnoses",
        input.diagnoses.len()
    );
    Ok(input)
}

/// Parse a submission stored in a file.
///
/// # Errors
/// Returns `FormError` if the file cannot be opened or parsed.
pub fn read_submission_file(path: &Path) -> Result<PatientInput, FormError> {
    let file = std::fs::File::open(path)?;
    read_submission(std::io::BufReader::new(file))
}

/// Diagnosis options the form offers, in catalog order.
#[must_use]
pub fn diagnosis_options(catalog: &FeatureCatalog) -> Vec<String> {
    catalog
        .diagnosis_short_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}
