//! Classifier port: Trait for the pre-trained scoring model.
//!
//! This trait abstracts the loaded model artifact from the application logic.

use crate::domain::FeatureVector;

/// Errors that can occur while scoring a feature vector.
///
/// These are configuration errors, not transient ones: retrying the same
/// vector against the same model yields the same failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Feature count mismatch: model expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Feature {index} mismatch: model expects {expected:?}, got {got:?}")]
    FeatureMismatch {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("Model produced an invalid probability: {0}")]
    InvalidOutput(f64),

    #[error("Model evaluation failed: {0}")]
    Model(String),
}

/// Trait for binary classifiers scoring one feature vector.
///
/// Implementations are pure: the same vector always yields the same
/// probability for a loaded model.
pub trait Classifier: Send + Sync {
    /// Number of features the model was trained on.
    fn n_features(&self) -> usize;

    /// Feature names in training order, if the artifact declares them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Probability of the positive class for one row of raw features.
    ///
    /// # Errors
    /// Returns `ScoringError` if the row does not fit the model.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError>;

    /// Score an assembled vector, checking shape and names against the model.
    ///
    /// # Errors
    /// Returns `ScoringError::DimensionMismatch` or `FeatureMismatch` if the
    /// vector does not match the model, and `InvalidOutput` if the model
    /// yields something outside [0, 1].
    fn score(&self, vector: &FeatureVector) -> Result<f64, ScoringError> {
        let expected = self.n_features();
        if vector.len() != expected {
            return Err(ScoringError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }

        if let Some(names) = self.feature_names() {
            for (index, (want, got)) in names.iter().zip(vector.names()).enumerate() {
                if want != got {
                    return Err(ScoringError::FeatureMismatch {
                        index,
                        expected: want.clone(),
                        got: got.clone(),
                    });
                }
            }
        }

        let p = self.predict_proba(vector.values())?;
        if !(0.0..=1.0).contains(&p) {
            return Err(ScoringError::InvalidOutput(p));
        }
        Ok(p)
    }
}
