//! Risk tier classification for delirium onset.

use serde::{Deserialize, Serialize};

/// Lower bound of the `Moderate` band.
pub const MODERATE_THRESHOLD: f64 = 0.5;

/// Lower bound of the `High` band.
pub const HIGH_THRESHOLD: f64 = 0.75;

/// Discrete risk tier derived from the predicted probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Low risk of delirium onset
    Low,
    /// Moderate risk, closer observation recommended
    Moderate,
    /// High risk, preventive measures advised
    High,
}

impl RiskTier {
    /// Map a probability to its tier.
    ///
    /// Each band is closed on its lower edge: `[0, 0.5)`, `[0.5, 0.75)`,
    /// `[0.75, 1]`.
    #[must_use]
    pub fn from_probability(p: f64) -> Self {
        if p < MODERATE_THRESHOLD {
            Self::Low
        } else if p < HIGH_THRESHOLD {
            Self::Moderate
        } else {
            Self::High
        }
    }

    /// Heading shown to the clinician.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Moderate => "Moderate Risk",
            Self::High => "High Risk",
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - routine delirium screening",
            Self::Moderate => "Moderate risk - closer observation recommended",
            Self::High => "High risk - preventive measures advised",
        }
    }

    /// Display color (RGB): green, orange, red.
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Low => (16, 185, 129),
            Self::Moderate => (245, 158, 11),
            Self::High => (239, 68, 68),
        }
    }

    /// Stable lowercase key used in exported payloads and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }

    /// Inverse of `as_str`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}
