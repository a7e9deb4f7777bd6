//! Feature catalog: the ordered feature list the classifier was trained on.
//!
//! The catalog holds two index-aligned name lists. Long names are the
//! identifiers the model expects, short names are what a clinician sees and
//! what the input form binds values to. Diagnosis flags are recognised by the
//! `diag_` marker in their long name.

use std::collections::HashSet;

use serde::Serialize;

/// Marker identifying a binary diagnosis feature in a long name.
pub const DIAGNOSIS_MARKER: &str = "diag_";

/// Errors raised while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Feature catalog is empty")]
    Empty,

    #[error("Feature list has {long} entries but short name list has {short}")]
    LengthMismatch { long: usize, short: usize },

    #[error("Duplicate short name in catalog: {0}")]
    DuplicateShortName(String),

    #[error("Duplicate feature name in catalog: {0}")]
    DuplicateLongName(String),

    #[error("Catalog contains only diagnosis features")]
    NoContinuousFeatures,
}

/// Immutable, index-aligned feature catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureCatalog {
    long_names: Vec<String>,
    short_names: Vec<String>,
    diagnosis_indices: Vec<usize>,
}

impl FeatureCatalog {
    /// Build a catalog from the two parallel name lists.
    ///
    /// # Errors
    /// Returns `CatalogError` if the lists are empty, differ in length,
    /// contain duplicates, or describe diagnosis flags only.
    pub fn new(long_names: Vec<String>, short_names: Vec<String>) -> Result<Self, CatalogError> {
        if long_names.len() != short_names.len() {
            return Err(CatalogError::LengthMismatch {
                long: long_names.len(),
                short: short_names.len(),
            });
        }
        if long_names.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(short_names.len());
        for name in &short_names {
            if !seen.insert(name.as_str()) {
                return Err(CatalogError::DuplicateShortName(name.clone()));
            }
        }
        let mut seen = HashSet::with_capacity(long_names.len());
        for name in &long_names {
            if !seen.insert(name.as_str()) {
                return Err(CatalogError::DuplicateLongName(name.clone()));
            }
        }

        let diagnosis_indices: Vec<usize> = long_names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.contains(DIAGNOSIS_MARKER))
            .map(|(i, _)| i)
            .collect();

        if diagnosis_indices.len() == long_names.len() {
            return Err(CatalogError::NoContinuousFeatures);
        }

        tracing::debug!(
            "Built feature catalog: {} features, {} diagnosis flags",
            long_names.len(),
            diagnosis_indices.len()
        );

        Ok(Self {
            long_names,
            short_names,
            diagnosis_indices,
        })
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.long_names.len()
    }

    /// Always false for a constructed catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.long_names.is_empty()
    }

    #[must_use]
    pub fn long_names(&self) -> &[String] {
        &self.long_names
    }

    #[must_use]
    pub fn short_names(&self) -> &[String] {
        &self.short_names
    }

    /// Indices of diagnosis flag features, ascending.
    #[must_use]
    pub fn diagnosis_indices(&self) -> &[usize] {
        &self.diagnosis_indices
    }

    #[must_use]
    pub fn is_diagnosis(&self, index: usize) -> bool {
        self.diagnosis_indices.binary_search(&index).is_ok()
    }

    /// Short names of diagnosis features, in catalog order.
    ///
    /// These are the options an input form offers for selection.
    #[must_use]
    pub fn diagnosis_short_names(&self) -> Vec<&str> {
        self.diagnosis_indices
            .iter()
            .map(|&i| self.short_names[i].as_str())
            .collect()
    }

    /// Short names of the continuous (non-diagnosis) features, in catalog order.
    #[must_use]
    pub fn continuous_short_names(&self) -> Vec<&str> {
        self.short_names
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.is_diagnosis(*i))
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Catalog position of a short name.
    #[must_use]
    pub fn position_of_short(&self, short_name: &str) -> Option<usize> {
        self.short_names.iter().position(|s| s == short_name)
    }
}
