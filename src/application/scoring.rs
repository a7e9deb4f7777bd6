//! Scoring service: Orchestrates one delirium risk scoring event.
//!
//! This service coordinates:
//! - Input validation
//! - Feature vector assembly
//! - Model scoring and risk tiering
//! - Record construction
//! - Export to the configured collector

use std::sync::Arc;

use crate::domain::{
    assemble, require_case_identifier, FeatureCatalog, FeatureVector, PatientInput,
    RawInputBundle, RiskTier, ScoringRecord,
};
use crate::ports::{Classifier, DeliveryError, Exporter};
use crate::DeliriskError;

/// Score and tier for one assembled vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub features: FeatureVector,
    pub probability: f64,
    pub tier: RiskTier,
}

/// What happened to the record after scoring.
#[derive(Debug)]
pub enum DeliveryStatus {
    Delivered,
    /// No exporter configured
    Skipped,
    /// The collector did not accept the record; the result is still valid.
    Failed(DeliveryError),
}

/// Result of a full scoring event.
#[derive(Debug)]
pub struct ScoringOutcome {
    pub record: ScoringRecord,
    pub delivery: DeliveryStatus,
}

impl ScoringOutcome {
    #[must_use]
    pub fn delivered(&self) -> bool {
        matches!(self.delivery, DeliveryStatus::Delivered)
    }

    #[must_use]
    pub fn delivery_error(&self) -> Option<&DeliveryError> {
        match &self.delivery {
            DeliveryStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Service running the scoring pipeline against a loaded catalog and model.
///
/// Catalog and classifier are loaded once and shared read-only; each call is
/// an independent scoring event.
pub struct ScoringService<C>
where
    C: Classifier,
{
    catalog: Arc<FeatureCatalog>,
    classifier: Arc<C>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl<C> ScoringService<C>
where
    C: Classifier,
{
    /// Create a service that scores without exporting.
    pub fn new(catalog: Arc<FeatureCatalog>, classifier: Arc<C>) -> Self {
        Self {
            catalog,
            classifier,
            exporter: None,
        }
    }

    /// Attach an export target.
    #[must_use]
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    /// Validate caller input and score it.
    ///
    /// The case identifier and clinical fields are checked before the model
    /// is invoked.
    ///
    /// # Errors
    /// Returns `DeliriskError::Record` for an unset case identifier,
    /// `Validation` for rejected clinical fields, `Assembly` if the input does
    /// not fit the catalog and `Scoring` if the model rejects the vector.
    pub fn assess(&self, input: &PatientInput) -> Result<Assessment, DeliriskError> {
        require_case_identifier(input.mrn)?;
        input.validate()?;
        self.assess_bundle(&input.to_bundle())
    }

    /// Assemble and score a raw bundle.
    ///
    /// # Errors
    /// Returns `DeliriskError::Assembly` or `DeliriskError::Scoring`.
    pub fn assess_bundle(&self, bundle: &RawInputBundle) -> Result<Assessment, DeliriskError> {
        let features = assemble(&self.catalog, bundle)?;
        tracing::debug!("Assembled feature vector ({} features)", features.len());

        let probability = self.classifier.score(&features)?;
        let tier = RiskTier::from_probability(probability);

        tracing::info!("Scored feature vector: p={:.4}, tier={}", probability, tier);
        Ok(Assessment {
            features,
            probability,
            tier,
        })
    }

    /// Run a full scoring event: assess, build the record, export it.
    ///
    /// A delivery failure does not fail the event; it is reported in the
    /// returned outcome alongside the valid record.
    ///
    /// # Errors
    /// Returns error if validation, assembly, scoring or record construction fails.
    pub fn score(&self, input: &PatientInput) -> Result<ScoringOutcome, DeliriskError> {
        let assessment = self.assess(input)?;
        let record = ScoringRecord::build(
            assessment.features,
            assessment.probability,
            assessment.tier,
            input.mrn,
        )?;

        let delivery = self.export(&record);
        Ok(ScoringOutcome { record, delivery })
    }

    fn export(&self, record: &ScoringRecord) -> DeliveryStatus {
        let Some(exporter) = &self.exporter else {
            tracing::debug!("No exporter configured, skipping delivery");
            return DeliveryStatus::Skipped;
        };

        match exporter.deliver(record) {
            Ok(()) => {
                tracing::info!("Record delivered via {}", exporter.target());
                DeliveryStatus::Delivered
            }
            Err(e) => {
                tracing::error!("Failed to deliver record via {}: {}", exporter.target(), e);
                DeliveryStatus::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordError, AGE_FIELD, BILIRUBIN_FIELD, SODIUM_FIELD};
    use crate::ports::ScoringError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Classifier returning a fixed probability and counting invocations.
    struct FixedClassifier {
        p: f64,
        n: usize,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(p: f64) -> Self {
            Self {
                p,
                n: 5,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn n_features(&self) -> usize {
            self.n
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.p)
        }
    }

    #[derive(Default)]
    struct RecordingExporter {
        records: Mutex<Vec<ScoringRecord>>,
    }

    impl Exporter for RecordingExporter {
        fn target(&self) -> &str {
            "memory"
        }

        fn deliver(&self, record: &ScoringRecord) -> Result<(), DeliveryError> {
            self.records.lock().expect("lock").push(record.clone());
            Ok(())
        }
    }

    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn target(&self) -> &str {
            "failing"
        }

        fn deliver(&self, _record: &ScoringRecord) -> Result<(), DeliveryError> {
            Err(DeliveryError::Status(503))
        }
    }

    fn catalog() -> Arc<FeatureCatalog> {
        Arc::new(
            FeatureCatalog::new(
                vec![
                    "Age".into(),
                    "Sodium".into(),
                    "Bilirubin".into(),
                    "diag_A".into(),
                    "diag_B".into(),
                ],
                vec![
                    AGE_FIELD.into(),
                    SODIUM_FIELD.into(),
                    BILIRUBIN_FIELD.into(),
                    "diag_A".into(),
                    "diag_B".into(),
                ],
            )
            .expect("valid catalog"),
        )
    }

    fn input(mrn: u64) -> PatientInput {
        PatientInput {
            mrn: Some(mrn),
            age: Some(70),
            sodium: Some(140.0),
            bilirubin: Some(1.5),
            diagnoses: vec!["diag_A".into()],
        }
    }

    #[test]
    fn test_end_to_end_high_risk() {
        let exporter = Arc::new(RecordingExporter::default());
        let service = ScoringService::new(catalog(), Arc::new(FixedClassifier::new(0.8)))
            .with_exporter(exporter.clone());

        let outcome = service.score(&input(12345)).expect("Should score");

        let record = &outcome.record;
        assert_eq!(record.features().values(), &[70.0, 140.0, 1.5, 1.0, 0.0]);
        assert_eq!(record.mrn(), 12345);
        assert!((record.pred_proba() - 0.8).abs() < f64::EPSILON);
        assert_eq!(record.risk_tier(), RiskTier::High);
        assert!(!record.unique_identifier().is_empty());
        assert!(!record.timestamp().is_empty());

        assert!(outcome.delivered());
        let delivered = exporter.records.lock().expect("lock");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].unique_identifier(), record.unique_identifier());
    }

    #[test]
    fn test_unset_case_identifier_blocks_scoring() {
        let classifier = Arc::new(FixedClassifier::new(0.8));
        let service = ScoringService::new(catalog(), classifier.clone());

        let err = service.score(&input(0)).expect_err("must fail");
        assert!(matches!(
            err,
            DeliriskError::Record(RecordError::InvalidCaseIdentifier)
        ));

        let missing = PatientInput { mrn: None, ..input(1) };
        assert!(service.score(&missing).is_err());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_blocks_scoring() {
        let classifier = Arc::new(FixedClassifier::new(0.8));
        let service = ScoringService::new(catalog(), classifier.clone());

        let too_young = PatientInput { age: Some(12), ..input(1) };
        let err = service.score(&too_young).expect_err("must fail");
        assert!(matches!(err, DeliriskError::Validation(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_diagnosis_blocks_scoring() {
        let classifier = Arc::new(FixedClassifier::new(0.8));
        let service = ScoringService::new(catalog(), classifier.clone());

        let odd = PatientInput {
            diagnoses: vec!["diag_Z".into()],
            ..input(1)
        };
        let err = service.score(&odd).expect_err("must fail");
        assert!(matches!(err, DeliriskError::Assembly(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dimension_mismatch_is_scoring_error() {
        let mut classifier = FixedClassifier::new(0.8);
        classifier.n = 4;
        let service = ScoringService::new(catalog(), Arc::new(classifier));

        let err = service.score(&input(1)).expect_err("must fail");
        assert!(matches!(
            err,
            DeliriskError::Scoring(ScoringError::DimensionMismatch { expected: 4, got: 5 })
        ));
    }

    #[test]
    fn test_delivery_failure_keeps_result() {
        let service = ScoringService::new(catalog(), Arc::new(FixedClassifier::new(0.6)))
            .with_exporter(Arc::new(FailingExporter));

        let outcome = service.score(&input(7)).expect("Should still score");
        assert_eq!(outcome.record.risk_tier(), RiskTier::Moderate);
        assert!(!outcome.delivered());
        assert!(matches!(
            outcome.delivery_error(),
            Some(DeliveryError::Status(503))
        ));
    }

    #[test]
    fn test_repeat_events_are_deterministic_but_distinct() {
        let service = ScoringService::new(catalog(), Arc::new(FixedClassifier::new(0.3)));

        let a = service.score(&input(99)).expect("score");
        let b = service.score(&input(99)).expect("score");
        assert!(matches!(a.delivery, DeliveryStatus::Skipped));
        assert_ne!(a.record.unique_identifier(), b.record.unique_identifier());
        assert_eq!(a.record.pred_proba(), b.record.pred_proba());
        assert_eq!(a.record.risk_tier(), b.record.risk_tier());
        assert_eq!(a.record.risk_tier(), RiskTier::Low);
    }

    #[test]
    fn test_records_exported_to_sqlite() {
        let store = Arc::new(crate::adapters::sqlite::SqliteExporter::in_memory().expect("db"));
        let service = ScoringService::new(catalog(), Arc::new(FixedClassifier::new(0.55)))
            .with_exporter(store.clone());

        let outcome = service.score(&input(321)).expect("Should score");
        assert!(outcome.delivered());

        let stored = store
            .find(outcome.record.unique_identifier())
            .expect("query")
            .expect("stored");
        assert_eq!(stored.mrn, 321);
        assert_eq!(stored.risk_tier, RiskTier::Moderate);
        assert_eq!(stored.payload["diag_A"], serde_json::json!(1));
    }

    #[test]
    fn test_bundled_model_end_to_end() {
        let artifacts = crate::adapters::model::load_artifacts(std::path::Path::new("models"), false)
            .expect("bundled model loads");
        let service = ScoringService::new(
            Arc::new(artifacts.catalog),
            Arc::new(artifacts.model),
        );

        let patient = PatientInput {
            mrn: Some(12345),
            age: Some(82),
            sodium: Some(128.0),
            bilirubin: Some(1.6),
            diagnoses: vec!["Sepsis".into(), "Dementia".into()],
        };
        let first = service.assess(&patient).expect("assess");
        let reordered = PatientInput {
            diagnoses: vec!["Dementia".into(), "Sepsis".into()],
            ..patient.clone()
        };
        let second = service.assess(&reordered).expect("assess");

        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first.probability));
        assert_eq!(first.tier, RiskTier::from_probability(first.probability));
    }
}
