//! Scoring record: the immutable, uniquely identified result of one scoring event.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::risk::RiskTier;
use super::vector::FeatureVector;

/// Timestamp layout of exported records (local capture time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised by the record builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid case identifier: please enter an MRN")]
    InvalidCaseIdentifier,
}

/// Reject an absent or unset (`0`) case identifier.
///
/// # Errors
/// Returns `RecordError::InvalidCaseIdentifier`.
pub fn require_case_identifier(case_id: Option<u64>) -> Result<u64, RecordError> {
    match case_id {
        Some(id) if id != 0 => Ok(id),
        _ => Err(RecordError::InvalidCaseIdentifier),
    }
}

/// Exported result of one scoring event.
///
/// Serializes to a flat key/value object: one entry per feature (by long
/// name), followed by the identifier, timestamp, probability, tier and case
/// identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRecord {
    unique_identifier: String,
    timestamp: String,
    mrn: u64,
    pred_proba: f64,
    risk_tier: RiskTier,
    features: FeatureVector,
}

impl ScoringRecord {
    /// Build a record stamped with the current local time.
    ///
    /// # Errors
    /// Returns `RecordError::InvalidCaseIdentifier` if `case_id` is absent or `0`.
    pub fn build(
        features: FeatureVector,
        pred_proba: f64,
        risk_tier: RiskTier,
        case_id: Option<u64>,
    ) -> Result<Self, RecordError> {
        Self::build_at(
            features,
            pred_proba,
            risk_tier,
            case_id,
            chrono::Local::now().naive_local(),
        )
    }

    /// Build a record with an explicit capture instant.
    ///
    /// # Errors
    /// Returns `RecordError::InvalidCaseIdentifier` if `case_id` is absent or `0`.
    pub fn build_at(
        features: FeatureVector,
        pred_proba: f64,
        risk_tier: RiskTier,
        case_id: Option<u64>,
        captured_at: chrono::NaiveDateTime,
    ) -> Result<Self, RecordError> {
        let mrn = require_case_identifier(case_id)?;

        Ok(Self {
            unique_identifier: uuid_v4(),
            timestamp: captured_at.format(TIMESTAMP_FORMAT).to_string(),
            mrn,
            pred_proba,
            risk_tier,
            features,
        })
    }

    #[must_use]
    pub fn unique_identifier(&self) -> &str {
        &self.unique_identifier
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn mrn(&self) -> u64 {
        self.mrn
    }

    #[must_use]
    pub fn pred_proba(&self) -> f64 {
        self.pred_proba
    }

    #[must_use]
    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    #[must_use]
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// Flat JSON payload for export.
    ///
    /// # Errors
    /// Returns error if a value cannot be represented in JSON.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for ScoringRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.features.len() + 5))?;
        for (name, value, is_flag) in self.features.fields() {
            if is_flag {
                map.serialize_entry(name, &(value as u8))?;
            } else {
                map.serialize_entry(name, &value)?;
            }
        }
        map.serialize_entry("unique_identifier", &self.unique_identifier)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("pred_proba", &self.pred_proba)?;
        map.serialize_entry("risk_tier", &self.risk_tier)?;
        map.serialize_entry("mrn", &self.mrn)?;
        map.end()
    }
}

/// Generate a UUID v4 (random) using CSPRNG.
///
/// Uses ChaCha20Rng seeded from OS entropy so duplicate submissions of the
/// same inputs never share an identifier downstream.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::FeatureCatalog;
    use crate::domain::patient::RawInputBundle;
    use crate::domain::vector::assemble;

    fn vector() -> FeatureVector {
        let catalog = FeatureCatalog::new(
            vec!["age".into(), "diag_A".into()],
            vec!["Age".into(), "Diagnosis A".into()],
        )
        .expect("valid catalog");
        let bundle = RawInputBundle::new()
            .with_value("Age", 70.0)
            .with_diagnosis("Diagnosis A");
        assemble(&catalog, &bundle).expect("Should assemble")
    }

    #[test]
    fn test_build_record() {
        let record = ScoringRecord::build(vector(), 0.8, RiskTier::High, Some(12345))
            .expect("Should build");

        assert_eq!(record.mrn(), 12345);
        assert_eq!(record.risk_tier(), RiskTier::High);
        assert!((record.pred_proba() - 0.8).abs() < f64::EPSILON);
        assert_eq!(record.unique_identifier().len(), 36);
        assert_eq!(record.timestamp().len(), 19);
    }

    #[test]
    fn test_rejects_unset_case_identifier() {
        for case_id in [None, Some(0)] {
            let err = ScoringRecord::build(vector(), 0.8, RiskTier::High, case_id)
                .expect_err("must fail");
            assert_eq!(err, RecordError::InvalidCaseIdentifier);
        }
    }

    #[test]
    fn test_timestamp_format() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 3))
            .expect("valid instant");
        let record = ScoringRecord::build_at(vector(), 0.2, RiskTier::Low, Some(1), at)
            .expect("Should build");
        assert_eq!(record.timestamp(), "2024-03-09 07:05:03");
    }

    #[test]
    fn test_identifiers_are_unique() {
        let a = ScoringRecord::build(vector(), 0.8, RiskTier::High, Some(1)).expect("build");
        let b = ScoringRecord::build(vector(), 0.8, RiskTier::High, Some(1)).expect("build");
        assert_ne!(a.unique_identifier(), b.unique_identifier());
    }

    #[test]
    fn test_uuid_generation() {
        let id = uuid_v4();
        assert_eq!(id.len(), 36);
        assert_eq!(id.as_bytes()[14], b'4');
    }

    #[test]
    fn test_flat_payload() {
        let record = ScoringRecord::build(vector(), 0.8, RiskTier::High, Some(12345))
            .expect("Should build");
        let payload = record.to_payload().expect("Should serialize");
        let obj = payload.as_object().expect("object payload");

        assert_eq!(obj.len(), 7);
        assert_eq!(obj["age"], serde_json::json!(70.0));
        assert_eq!(obj["diag_A"], serde_json::json!(1));
        assert_eq!(obj["mrn"], serde_json::json!(12345));
        assert_eq!(obj["risk_tier"], serde_json::json!("high"));
        assert_eq!(obj["pred_proba"], serde_json::json!(0.8));
        assert_eq!(obj["unique_identifier"], serde_json::json!(record.unique_identifier()));
        assert_eq!(obj["timestamp"], serde_json::json!(record.timestamp()));
    }
}
