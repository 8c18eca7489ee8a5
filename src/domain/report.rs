//! Human-readable assessment report with clinical value labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::{sex_label, RiskAssessment};
use super::patient::ClinicalFeatures;

/// One labelled line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub label: String,
    pub value: String,
}

impl ReportEntry {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentReport {
    pub patient_name: String,
    pub patient_id: String,
    pub patient_details: Vec<ReportEntry>,
    pub risk_assessment: Vec<ReportEntry>,
}

impl AssessmentReport {
    #[must_use]
    pub fn build(
        patient_name: &str,
        patient_id: &str,
        features: &ClinicalFeatures,
        assessment: &RiskAssessment,
    ) -> Self {
        let f = features;
        let patient_details = vec![
            ReportEntry::new("Age", format!("{} years", f.age)),
            ReportEntry::new("Sex", sex_label(f.sex)),
            ReportEntry::new("Chest Pain Type", chest_pain_label(f.cp)),
            ReportEntry::new("Resting Blood Pressure", format!("{} mm Hg", f.trestbps)),
            ReportEntry::new("Serum Cholesterol", format!("{} mg/dl", f.chol)),
            ReportEntry::new("Fasting Blood Sugar", fasting_sugar_label(f.fbs)),
            ReportEntry::new("Resting ECG", resting_ecg_label(f.restecg)),
            ReportEntry::new("Maximum Heart Rate", format!("{} bpm", f.thalachh)),
            ReportEntry::new("Exercise Induced Angina", yes_no(f.exang)),
            ReportEntry::new("ST Depression", f.oldpeak.to_string()),
            ReportEntry::new("Slope", slope_label(f.slope)),
            ReportEntry::new("Number of Major Vessels", f.ca.to_string()),
            ReportEntry::new("Thalassemia", thal_label(f.thal)),
        ];

        let risk_assessment = vec![
            ReportEntry::new("Risk Probability", format_percentage(assessment.risk_percentage())),
            ReportEntry::new("Risk Level", assessment.risk_level.as_str()),
            ReportEntry::new("Assessment Date", format_date(assessment.assessed_at)),
        ];

        Self {
            patient_name: patient_name.to_string(),
            patient_id: patient_id.to_string(),
            patient_details,
            risk_assessment,
        }
    }
}

fn format_percentage(pct: Option<f64>) -> String {
    pct.map_or_else(|| "N/A".to_string(), |p| format!("{p:.1}%"))
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

// Categorical fields arrive as validated floats; exact matches only.
fn category(value: f64, labels: &[&'static str]) -> &'static str {
    labels
        .iter()
        .enumerate()
        .find(|(i, _)| *i as f64 == value)
        .map_or("Unknown", |(_, label)| *label)
}

fn chest_pain_label(cp: f64) -> &'static str {
    category(
        cp,
        &[
            "Typical Angina",
            "Atypical Angina",
            "Non-anginal Pain",
            "Asymptomatic",
        ],
    )
}

fn resting_ecg_label(restecg: f64) -> &'static str {
    category(
        restecg,
        &[
            "Normal",
            "ST-T Wave Abnormality",
            "Left Ventricular Hypertrophy",
        ],
    )
}

fn slope_label(slope: f64) -> &'static str {
    category(slope, &["Upsloping", "Flat", "Downsloping"])
}

fn thal_label(thal: f64) -> &'static str {
    category(
        thal,
        &[
            "Normal",
            "Fixed Defect",
            "Reversible Defect",
            "Reversible Defect (Type 3)",
        ],
    )
}

fn fasting_sugar_label(fbs: f64) -> &'static str {
    if fbs == 1.0 {
        "Yes (> 120 mg/dl)"
    } else {
        "No (≤ 120 mg/dl)"
    }
}

fn yes_no(flag: f64) -> &'static str {
    if flag == 1.0 {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::Classification;
    use crate::domain::patient::tests::sample_features;

    fn value_of<'a>(entries: &'a [ReportEntry], label: &str) -> &'a str {
        entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value.as_str())
            .expect("label present")
    }

    #[test]
    fn test_report_maps_clinical_values() {
        let assessment = RiskAssessment::new(Classification {
            predicted_class: 1,
            probability: Some(0.8772),
        });
        let report = AssessmentReport::build("Jane Roe", "P-1001", &sample_features(), &assessment);

        let d = &report.patient_details;
        assert_eq!(d.len(), 13);
        assert_eq!(value_of(d, "Age"), "63 years");
        assert_eq!(value_of(d, "Sex"), "Male");
        assert_eq!(value_of(d, "Chest Pain Type"), "Asymptomatic");
        assert_eq!(value_of(d, "Resting Blood Pressure"), "145 mm Hg");
        assert_eq!(value_of(d, "Fasting Blood Sugar"), "Yes (> 120 mg/dl)");
        assert_eq!(value_of(d, "ST Depression"), "2.3");
        assert_eq!(value_of(d, "Thalassemia"), "Fixed Defect");

        let r = &report.risk_assessment;
        assert_eq!(value_of(r, "Risk Probability"), "87.7%");
        assert_eq!(value_of(r, "Risk Level"), "High Risk");
    }

    #[test]
    fn test_missing_probability_is_not_available() {
        let assessment = RiskAssessment::new(Classification {
            predicted_class: 0,
            probability: None,
        });
        let report = AssessmentReport::build("A", "B", &sample_features(), &assessment);
        assert_eq!(value_of(&report.risk_assessment, "Risk Probability"), "N/A");
        assert_eq!(value_of(&report.risk_assessment, "Risk Level"), "Low Risk");
    }

    #[test]
    fn test_fractional_category_is_unknown() {
        assert_eq!(slope_label(1.5), "Unknown");
        assert_eq!(slope_label(2.0), "Downsloping");
    }
}
