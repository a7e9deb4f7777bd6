//! Model adapter: loads the persisted model artifacts and implements `Classifier`.
//!
//! A model directory holds three artifacts:
//! - `model.json`: the trained classifier (gradient-boosted trees or logistic regression)
//! - `feature_list.json`: ordered long feature names expected by the classifier
//! - `short_names.json`: index-aligned display names
//!
//! An optional `manifest.json` binds the artifacts to SHA-256 digests. When it
//! is present every listed digest must match; `require_manifest` makes it
//! mandatory.
//!
//! Any missing, corrupt or mismatched artifact is fatal: the process cannot
//! score without a consistent catalog and model.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{CatalogError, FeatureCatalog};
use crate::ports::{Classifier, ScoringError};

pub const MODEL_FILE: &str = "model.json";
pub const FEATURE_LIST_FILE: &str = "feature_list.json";
pub const SHORT_NAMES_FILE: &str = "short_names.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const ARTIFACT_FILES: [&str; 3] = [MODEL_FILE, FEATURE_LIST_FILE, SHORT_NAMES_FILE];

/// Error type for artifact loading.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Model artifact not found: {0:?}")]
    Missing(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt model artifact {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Invalid feature catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Model expects {model} features but feature list has {catalog}")]
    ShapeMismatch { model: usize, catalog: usize },

    #[error("Model feature {index} is {model:?} but feature list has {catalog:?}")]
    NameMismatch {
        index: usize,
        model: String,
        catalog: String,
    },

    #[error("{MANIFEST_FILE} is required but missing from {0:?}")]
    ManifestRequired(PathBuf),

    #[error("Integrity check failed for {0}")]
    HashMismatch(String),
}

/// Persisted classifier: declared feature names plus model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

/// Supported model families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Gradient-boosted trees with a logistic link (binary:logistic).
    TreeEnsemble(TreeEnsemble),
    /// Logistic regression with an optional standard scaler.
    Logistic(LogisticModel),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Prior probability; its logit is the starting margin.
    #[serde(default = "default_base_score")]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

fn default_base_score() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

/// Tree node. Node 0 is the root; children always follow their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        /// Taken when `x < threshold`
        yes: usize,
        no: usize,
        /// Taken when the value is missing; defaults to `yes`
        #[serde(default)]
        missing: Option<usize>,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub scaler_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub scaler_scale: Option<Vec<f64>>,
}

/// Optional integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactManifest {
    files: BTreeMap<String, String>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

impl Tree {
    fn leaf_value(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    let v = x[*feature];
                    idx = if v.is_nan() {
                        missing.unwrap_or(*yes)
                    } else if v < *threshold {
                        *yes
                    } else {
                        *no
                    };
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { leaf } if !leaf.is_finite() => {
                    return Err(format!("node {i}: leaf value is not finite"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {i}: feature index {feature} out of range (n_features={n_features})"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: threshold is not finite"));
                    }
                    for child in [Some(*yes), Some(*no), *missing].into_iter().flatten() {
                        if child <= i || child >= len {
                            return Err(format!("node {i}: invalid child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// A loaded, validated model ready for scoring.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    feature_names: Vec<String>,
    spec: ModelSpec,
}

impl LoadedModel {
    /// Validate an artifact and wrap it for scoring.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency found.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, String> {
        let n = artifact.feature_names.len();
        if n == 0 {
            return Err("feature_names is empty".into());
        }

        match &artifact.model {
            ModelSpec::TreeEnsemble(ensemble) => {
                if !(ensemble.base_score > 0.0 && ensemble.base_score < 1.0) {
                    return Err(format!(
                        "base_score {} must lie strictly between 0 and 1",
                        ensemble.base_score
                    ));
                }
                if ensemble.trees.is_empty() {
                    return Err("tree ensemble has no trees".into());
                }
                for (t, tree) in ensemble.trees.iter().enumerate() {
                    tree.validate(n).map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
            ModelSpec::Logistic(lr) => {
                if lr.coefficients.len() != n {
                    return Err(format!(
                        "{} coefficients for {n} features",
                        lr.coefficients.len()
                    ));
                }
                if let Some(mean) = &lr.scaler_mean {
                    if mean.len() != n {
                        return Err("scaler_mean length does not match feature_names".into());
                    }
                }
                if let Some(scale) = &lr.scaler_scale {
                    if scale.len() != n {
                        return Err("scaler_scale length does not match feature_names".into());
                    }
                    if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                        return Err("scaler_scale contains zero or non-finite entries".into());
                    }
                }
            }
        }

        Ok(Self {
            feature_names: artifact.feature_names,
            spec: artifact.model,
        })
    }

    /// Model family, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.spec {
            ModelSpec::TreeEnsemble(_) => "tree_ensemble",
            ModelSpec::Logistic(_) => "logistic",
        }
    }
}

impl Classifier for LoadedModel {
    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError> {
        let n = self.feature_names.len();
        if features.len() != n {
            return Err(ScoringError::DimensionMismatch {
                expected: n,
                got: features.len(),
            });
        }

        let margin = match &self.spec {
            ModelSpec::TreeEnsemble(ensemble) => {
                logit(ensemble.base_score)
                    + ensemble
                        .trees
                        .iter()
                        .map(|tree| tree.leaf_value(features))
                        .sum::<f64>()
            }
            ModelSpec::Logistic(lr) => {
                let mut z = lr.intercept;
                for (i, (x, w)) in features.iter().zip(&lr.coefficients).enumerate() {
                    let mean = lr.scaler_mean.as_ref().map_or(0.0, |m| m[i]);
                    let scale = lr.scaler_scale.as_ref().map_or(1.0, |s| s[i]);
                    z += w * (x - mean) / scale;
                }
                z
            }
        };

        let p = sigmoid(margin);
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ScoringError::Model(format!("non-finite margin {margin}")))
        }
    }
}

/// Catalog and model loaded together from one directory.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub catalog: FeatureCatalog,
    pub model: LoadedModel,
}

/// Load and cross-check the three model artifacts in `dir`.
///
/// # Errors
/// Returns `ArtifactError` if any artifact is missing, corrupt, fails the
/// manifest check, or disagrees with the others.
pub fn load_artifacts(dir: &Path, require_manifest: bool) -> Result<Artifacts, ArtifactError> {
    verify_manifest(dir, require_manifest)?;

    let artifact: ModelArtifact = read_json(&dir.join(MODEL_FILE))?;
    let long_names: Vec<String> = read_json(&dir.join(FEATURE_LIST_FILE))?;
    let short_names: Vec<String> = read_json(&dir.join(SHORT_NAMES_FILE))?;

    let catalog = FeatureCatalog::new(long_names, short_names)?;

    if artifact.feature_names.len() != catalog.len() {
        return Err(ArtifactError::ShapeMismatch {
            model: artifact.feature_names.len(),
            catalog: catalog.len(),
        });
    }
    for (index, (model, listed)) in artifact
        .feature_names
        .iter()
        .zip(catalog.long_names())
        .enumerate()
    {
        if model != listed {
            return Err(ArtifactError::NameMismatch {
                index,
                model: model.clone(),
                catalog: listed.clone(),
            });
        }
    }

    let model = LoadedModel::from_artifact(artifact).map_err(|reason| ArtifactError::Corrupt {
        path: dir.join(MODEL_FILE),
        reason,
    })?;

    tracing::info!(
        "Loaded {} model from {:?} (n_features={}, diagnosis_flags={})",
        model.kind(),
        dir,
        catalog.len(),
        catalog.diagnosis_indices().len()
    );

    Ok(Artifacts { catalog, model })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn verify_manifest(dir: &Path, require_manifest: bool) -> Result<(), ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        if require_manifest {
            tracing::error!("No {MANIFEST_FILE} in {:?}", dir);
            return Err(ArtifactError::ManifestRequired(dir.to_path_buf()));
        }
        tracing::warn!("Loading model artifacts without integrity manifest");
        return Ok(());
    }

    let manifest: ArtifactManifest = read_json(&manifest_path)?;
    for required in ARTIFACT_FILES {
        if !manifest.files.contains_key(required) {
            return Err(ArtifactError::Corrupt {
                path: manifest_path,
                reason: format!("manifest does not bind {required}"),
            });
        }
    }

    for (rel, expected_hex) in &manifest.files {
        let bytes = read_bytes(&dir.join(rel))?;
        let actual_hex = sha256_hex(&bytes);
        if !constant_time_eq_str(&actual_hex, &expected_hex.to_ascii_lowercase()) {
            return Err(ArtifactError::HashMismatch(rel.clone()));
        }
    }

    tracing::info!("Model artifact hashes verified successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LONG: [&str; 5] = ["age", "sodium", "bilirubin", "diag_A", "diag_B"];
    const SHORT: [&str; 5] = ["Age", "Sodium", "Bilirubin", "Diagnosis A", "Diagnosis B"];

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    fn stump_model() -> ModelArtifact {
        // Single split on age < 65: leaves chosen so that
        // p(young) = sigmoid(-1) and p(old) = sigmoid(1).
        ModelArtifact {
            feature_names: names(&LONG),
            model: ModelSpec::TreeEnsemble(TreeEnsemble {
                base_score: 0.5,
                trees: vec![Tree {
                    nodes: vec![
                        Node::Split {
                            feature: 0,
                            threshold: 65.0,
                            yes: 1,
                            no: 2,
                            missing: None,
                        },
                        Node::Leaf { leaf: -1.0 },
                        Node::Leaf { leaf: 1.0 },
                    ],
                }],
            }),
        }
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) {
        let json = serde_json::to_vec(value).expect("serialize");
        fs::write(path, json).expect("write");
    }

    fn write_artifacts(dir: &Path, model: &ModelArtifact) {
        write_json(&dir.join(MODEL_FILE), model);
        write_json(&dir.join(FEATURE_LIST_FILE), &names(&LONG));
        write_json(&dir.join(SHORT_NAMES_FILE), &names(&SHORT));
    }

    fn write_manifest(dir: &Path) {
        let mut files = BTreeMap::new();
        for name in ARTIFACT_FILES {
            let bytes = fs::read(dir.join(name)).expect("read artifact");
            files.insert(name.to_string(), sha256_hex(&bytes));
        }
        write_json(&dir.join(MANIFEST_FILE), &ArtifactManifest { files });
    }

    #[test]
    fn test_load_and_score_tree_ensemble() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &stump_model());

        let artifacts = load_artifacts(temp.path(), false).expect("load");
        assert_eq!(artifacts.catalog.len(), 5);
        assert_eq!(artifacts.catalog.diagnosis_indices(), &[3, 4]);

        let old = artifacts
            .model
            .predict_proba(&[70.0, 140.0, 1.5, 1.0, 0.0])
            .expect("score");
        let young = artifacts
            .model
            .predict_proba(&[30.0, 140.0, 1.5, 1.0, 0.0])
            .expect("score");
        assert!((old - sigmoid(1.0)).abs() < 1e-12);
        assert!((young - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_value_follows_default_branch() {
        let model = LoadedModel::from_artifact(stump_model()).expect("valid");
        let p = model
            .predict_proba(&[f64::NAN, 140.0, 1.5, 0.0, 0.0])
            .expect("score");
        assert!((p - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_model_with_scaler() {
        let model = LoadedModel::from_artifact(ModelArtifact {
            feature_names: names(&["age", "diag_A"]),
            model: ModelSpec::Logistic(LogisticModel {
                coefficients: vec![2.0, 1.0],
                intercept: -1.0,
                scaler_mean: Some(vec![60.0, 0.0]),
                scaler_scale: Some(vec![10.0, 1.0]),
            }),
        })
        .expect("valid");

        // z = -1 + 2 * (70 - 60) / 10 + 1 * 1 = 2
        let p = model.predict_proba(&[70.0, 1.0]).expect("score");
        assert!((p - sigmoid(2.0)).abs() < 1e-12);
        assert_eq!(
            model.predict_proba(&[70.0]),
            Err(ScoringError::DimensionMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &stump_model());
        fs::remove_file(temp.path().join(SHORT_NAMES_FILE)).expect("remove");

        let err = load_artifacts(temp.path(), false).expect_err("must fail");
        assert!(matches!(err, ArtifactError::Missing(_)));
    }

    #[test]
    fn test_corrupt_artifact_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &stump_model());
        fs::write(temp.path().join(FEATURE_LIST_FILE), b"not json").expect("write");

        let err = load_artifacts(temp.path(), false).expect_err("must fail");
        assert!(matches!(err, ArtifactError::Corrupt { .. }));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_artifacts(temp.path(), &stump_model());
        write_json(&temp.path().join(SHORT_NAMES_FILE), &names(&SHORT[..4]));

        let err = load_artifacts(temp.path(), false).expect_err("must fail");
        assert!(matches!(
            err,
            ArtifactError::Catalog(CatalogError::LengthMismatch { long: 5, short: 4 })
        ));
    }

    #[test]
    fn test_model_catalog_disagreement_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let mut model = stump_model();
        model.feature_names[4] = "diag_C".into();
        write_artifacts(temp.path(), &model);

        let err = load_artifacts(temp.path(), false).expect_err("must fail");
        assert!(matches!(err, ArtifactError::NameMismatch { index: 4, .. }));
    }

    #[test]
    fn test_invalid_tree_rejected() {
        let mut model = stump_model();
        if let ModelSpec::TreeEnsemble(ensemble) = &mut model.model {
            ensemble.trees[0].nodes[0] = Node::Split {
                feature: 9,
                threshold: 1.0,
                yes: 1,
                no: 2,
                missing: None,
            };
        }
        assert!(LoadedModel::from_artifact(model).is_err());

        let mut cyclic = stump_model();
        if let ModelSpec::TreeEnsemble(ensemble) = &mut cyclic.model {
            ensemble.trees[0].nodes[0] = Node::Split {
                feature: 0,
                threshold: 1.0,
                yes: 0,
                no: 2,
                missing: None,
            };
        }
        assert!(LoadedModel::from_artifact(cyclic).is_err());
    }

    #[test]
    fn test_manifest_verification() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path();
        write_artifacts(dir, &stump_model());

        let err = load_artifacts(dir, true).expect_err("manifest required");
        assert!(matches!(err, ArtifactError::ManifestRequired(_)));

        write_manifest(dir);
        load_artifacts(dir, true).expect("manifest matches");

        // Tamper with the model after signing the manifest.
        let mut tampered = stump_model();
        if let ModelSpec::TreeEnsemble(ensemble) = &mut tampered.model {
            ensemble.base_score = 0.9;
        }
        write_json(&dir.join(MODEL_FILE), &tampered);
        let err = load_artifacts(dir, false).expect_err("hash mismatch");
        assert!(matches!(err, ArtifactError::HashMismatch(ref f) if f == MODEL_FILE));
    }

    #[test]
    fn test_bundled_models_load() {
        let artifacts = load_artifacts(Path::new("models"), false).expect("bundled model loads");
        assert!(!artifacts.catalog.diagnosis_indices().is_empty());

        let n = artifacts.catalog.len();
        let p = artifacts.model.predict_proba(&vec![0.0; n]).expect("score");
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq_str("abc", "abc"));
        assert!(!constant_time_eq_str("abc", "abd"));
        assert!(!constant_time_eq_str("abc", "ab"));
    }
}
