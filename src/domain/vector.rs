//! Feature vector assembly.
//!
//! Turns a name-keyed `RawInputBundle` into the catalog-ordered vector the
//! classifier consumes. Selection matching uses short names; the resulting
//! fields carry the long names the model was trained with.

use std::collections::HashSet;

use serde::Serialize;

use super::catalog::FeatureCatalog;
use super::patient::RawInputBundle;

/// Errors raised when a bundle does not satisfy the catalog contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("Required field missing or null: {0}")]
    MissingField(String),

    #[error("Selected diagnosis is not in the catalog: {0}")]
    UnknownSelection(String),
}

/// Catalog-ordered numeric encoding of one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
    flags: Vec<bool>,
}

impl FeatureVector {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric values in catalog order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Long feature names, index-aligned with `values`.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether the value at `index` is a diagnosis flag.
    #[must_use]
    pub fn is_flag(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// `(long name, value, is_flag)` triples in catalog order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, f64, bool)> {
        self.names
            .iter()
            .zip(&self.values)
            .zip(&self.flags)
            .map(|((name, value), flag)| (name.as_str(), *value, *flag))
    }
}

/// Assemble a feature vector in catalog order.
///
/// # Errors
/// Returns `AssemblyError::UnknownSelection` if a selected diagnosis is not a
/// diagnosis short name in the catalog, and `AssemblyError::MissingField` if a
/// continuous field is absent, null or not finite.
pub fn assemble(catalog: &FeatureCatalog, bundle: &RawInputBundle) -> Result<FeatureVector, AssemblyError> {
    let offered: HashSet<&str> = catalog.diagnosis_short_names().into_iter().collect();

    let mut selected = HashSet::with_capacity(bundle.selected_diagnoses().len());
    for diagnosis in bundle.selected_diagnoses() {
        if !offered.contains(diagnosis.as_str()) {
            return Err(AssemblyError::UnknownSelection(diagnosis.clone()));
        }
        selected.insert(diagnosis.as_str());
    }

    let n = catalog.len();
    let mut values = Vec::with_capacity(n);
    let mut flags = Vec::with_capacity(n);

    for (i, short) in catalog.short_names().iter().enumerate() {
        if catalog.is_diagnosis(i) {
            values.push(if selected.contains(short.as_str()) { 1.0 } else { 0.0 });
            flags.push(true);
            continue;
        }

        match bundle.get(short) {
            Some(Some(v)) if v.is_finite() => values.push(v),
            _ => return Err(AssemblyError::MissingField(short.clone())),
        }
        flags.push(false);
    }

    for field in bundle.fields() {
        if catalog.position_of_short(field).is_none() {
            tracing::debug!("Ignoring input field not in catalog: {field}");
        }
    }

    Ok(FeatureVector {
        names: catalog.long_names().to_vec(),
        values,
        flags,
    })
}
