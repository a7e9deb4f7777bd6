//! Patient input types for delirium onset risk prediction.
//!
//! `PatientInput` is what the input form hands over; `RawInputBundle` is the
//! untyped, name-keyed view the vector assembler consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Form field bound to the `Age` feature.
pub const AGE_FIELD: &str = "Age";

/// Form field bound to the serum sodium feature.
pub const SODIUM_FIELD: &str = "Sodium (Moles/volume)";

/// Form field bound to the serum bilirubin feature.
pub const BILIRUBIN_FIELD: &str = "Bilirubin (Moles/volume)";

pub const AGE_RANGE: std::ops::RangeInclusive<u32> = 18..=120;
pub const SODIUM_RANGE: std::ops::RangeInclusive<f64> = 0.0..=200.0;
pub const BILIRUBIN_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

/// Rejected caller input. Carries every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

/// Caller-facing values for one scoring event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    /// External case identifier (medical record number). `0` means unset.
    #[serde(default, alias = "case_id")]
    pub mrn: Option<u64>,

    /// Age in years (18-120)
    #[serde(default)]
    pub age: Option<u32>,

    /// Serum sodium in moles/volume (0-200)
    #[serde(default)]
    pub sodium: Option<f64>,

    /// Serum bilirubin in moles/volume (0-2)
    #[serde(default)]
    pub bilirubin: Option<f64>,

    /// Selected diagnosis short names
    #[serde(default)]
    pub diagnoses: Vec<String>,
}

impl PatientInput {
    /// Validate the clinical fields against the form's accepted ranges.
    ///
    /// The case identifier is not checked here; the record contract owns it.
    ///
    /// # Errors
    /// Returns a `ValidationError` listing every offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = Vec::new();

        match self.age {
            None | Some(0) => problems.push("Please enter a valid age (18 or older)".to_string()),
            Some(age) if !AGE_RANGE.contains(&age) => problems.push(format!(
                "Age {age} out of range [{}, {}]",
                AGE_RANGE.start(),
                AGE_RANGE.end()
            )),
            Some(_) => {}
        }

        check_measurement(&mut problems, "Sodium", self.sodium, &SODIUM_RANGE);
        check_measurement(&mut problems, "Bilirubin", self.bilirubin, &BILIRUBIN_RANGE);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }

    /// Bind the form values to their catalog short names.
    #[must_use]
    pub fn to_bundle(&self) -> RawInputBundle {
        let mut bundle = RawInputBundle::new();
        bundle.insert(AGE_FIELD, self.age.map(f64::from));
        bundle.insert(SODIUM_FIELD, self.sodium);
        bundle.insert(BILIRUBIN_FIELD, self.bilirubin);
        for diagnosis in &self.diagnoses {
            bundle.select(diagnosis.clone());
        }
        bundle
    }
}

fn check_measurement(
    problems: &mut Vec<String>,
    label: &str,
    value: Option<f64>,
    range: &std::ops::RangeInclusive<f64>,
) {
    match value {
        None => problems.push(format!("{label} is required")),
        Some(v) if !range.contains(&v) => problems.push(format!(
            "{label} {v} out of range [{}, {}]",
            range.start(),
            range.end()
        )),
        Some(_) => {}
    }
}

/// Raw, name-keyed values for one scoring event.
///
/// A `None` value records a field the caller left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInputBundle {
    values: BTreeMap<String, Option<f64>>,
    selected_diagnoses: Vec<String>,
}

impl RawInputBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value (or an explicit null) to a field name.
    pub fn insert(&mut self, field: impl Into<String>, value: Option<f64>) {
        self.values.insert(field.into(), value);
    }

    /// Builder-style `insert`.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.insert(field, Some(value));
        self
    }

    /// Mark a diagnosis short name as selected.
    pub fn select(&mut self, diagnosis: impl Into<String>) {
        self.selected_diagnoses.push(diagnosis.into());
    }

    /// Builder-style `select`.
    #[must_use]
    pub fn with_diagnosis(mut self, diagnosis: impl Into<String>) -> Self {
        self.select(diagnosis);
        self
    }

    /// Value bound to `field`: `None` if absent, `Some(None)` if null.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Option<f64>> {
        self.values.get(field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn selected_diagnoses(&self) -> &[String] {
        &self.selected_diagnoses
    }
}
