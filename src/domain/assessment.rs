//! Risk assessment types.
//!
//! Represents the output of the scaler + classifier pipeline and the stored
//! history rows derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::ClinicalFeatures;

/// Risk classification for heart disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    /// The predicted class is the single source of truth for the level.
    #[must_use]
    pub fn from_class(predicted_class: u8) -> Self {
        if predicted_class == 1 {
            Self::High
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn predicted_class(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::High => "High Risk",
        }
    }

    /// Parse the stored label. Unknown labels yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low risk" | "low" => Some(Self::Low),
            "high risk" | "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw classifier output before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// 0 = no disease, 1 = disease present
    pub predicted_class: u8,
    /// Probability of the positive class, when the classifier provides one
    pub probability: Option<f64>,
}

/// Result of one successful prediction. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub predicted_class: u8,
    pub risk_probability: Option<f64>,
    pub risk_level: RiskLevel,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    #[must_use]
    pub fn new(classification: Classification) -> Self {
        Self::at(classification, Utc::now())
    }

    #[must_use]
    pub fn at(classification: Classification, assessed_at: DateTime<Utc>) -> Self {
        Self {
            predicted_class: classification.predicted_class,
            risk_probability: classification.probability,
            risk_level: RiskLevel::from_class(classification.predicted_class),
            assessed_at,
        }
    }

    /// Probability as a 0-100 percentage.
    #[must_use]
    pub fn risk_percentage(&self) -> Option<f64> {
        self.risk_probability.map(|p| p * 100.0)
    }
}

/// One stored assessment with the observation it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub patient_name: String,
    pub patient_id: String,
    pub features: ClinicalFeatures,
    /// Stored as a 0-100 percentage
    pub risk_probability: Option<f64>,
    pub risk_level: RiskLevel,
    pub assessment_date: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Rebuild the assessment as it was when stored.
    #[must_use]
    pub fn assessment(&self) -> RiskAssessment {
        RiskAssessment {
            predicted_class: self.risk_level.predicted_class(),
            risk_probability: self.risk_probability.map(|pct| pct / 100.0),
            risk_level: self.risk_level,
            assessed_at: self.assessment_date,
        }
    }

    #[must_use]
    pub fn summary(&self) -> AssessmentSummary {
        AssessmentSummary {
            id: self.id,
            patient_name: self.patient_name.clone(),
            patient_id: self.patient_id.clone(),
            age: self.features.age,
            sex: sex_label(self.features.sex).to_string(),
            risk_probability: self.risk_probability,
            risk_level: self.risk_level,
            assessment_date: self.assessment_date,
        }
    }
}

/// History table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSummary {
    pub id: i64,
    pub patient_name: String,
    pub patient_id: String,
    pub age: f64,
    pub sex: String,
    /// 0-100 percentage
    pub risk_probability: Option<f64>,
    pub risk_level: RiskLevel,
    pub assessment_date: DateTime<Utc>,
}

/// Counts shown above the history table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub high_risk: usize,
    pub low_risk: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn from_summaries(summaries: &[AssessmentSummary]) -> Self {
        summaries.iter().fold(Self::default(), |mut stats, s| {
            stats.total += 1;
            match s.risk_level {
                RiskLevel::High => stats.high_risk += 1,
                RiskLevel::Low => stats.low_risk += 1,
            }
            stats
        })
    }
}

pub(crate) fn sex_label(sex: f64) -> &'static str {
    if sex == 1.0 {
        "Male"
    } else {
        "Female"
    }
}
