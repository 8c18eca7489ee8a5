//! Patient observation types for cardiovascular risk prediction.
//!
//! Based on the 13-attribute UCI heart disease feature set (Cleveland subset).

use serde::{Deserialize, Serialize};

/// Number of clinical features consumed by the classifier.
pub const CLINICAL_FEATURE_COUNT: usize = 13;

/// Every form field that takes part in validation.
///
/// Serialized names match the JSON field names of [`PatientObservation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    PatientName,
    PatientId,
    Age,
    Sex,
    Cp,
    Trestbps,
    Chol,
    Fbs,
    Restecg,
    Thalachh,
    Exang,
    Oldpeak,
    Slope,
    Ca,
    Thal,
}

impl Field {
    /// Identity fields, checked before any clinical field.
    pub const IDENTITY: [Field; 2] = [Field::PatientName, Field::PatientId];

    /// Clinical fields in model feature order:
    /// age, sex, cp, trestbps, chol, fbs, restecg, thalachh, exang, oldpeak, slope, ca, thal
    pub const CLINICAL: [Field; CLINICAL_FEATURE_COUNT] = [
        Field::Age,
        Field::Sex,
        Field::Cp,
        Field::Trestbps,
        Field::Chol,
        Field::Fbs,
        Field::Restecg,
        Field::Thalachh,
        Field::Exang,
        Field::Oldpeak,
        Field::Slope,
        Field::Ca,
        Field::Thal,
    ];

    /// Wire name of the field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatientName => "patientName",
            Self::PatientId => "patientId",
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Cp => "cp",
            Self::Trestbps => "trestbps",
            Self::Chol => "chol",
            Self::Fbs => "fbs",
            Self::Restecg => "restecg",
            Self::Thalachh => "thalachh",
            Self::Exang => "exang",
            Self::Oldpeak => "oldpeak",
            Self::Slope => "slope",
            Self::Ca => "ca",
            Self::Thal => "thal",
        }
    }

    /// Label shown to clinicians.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::PatientName => "Patient Name",
            Self::PatientId => "Patient ID",
            Self::Age => "Age",
            Self::Sex => "Sex",
            Self::Cp => "Chest Pain Type",
            Self::Trestbps => "Resting Blood Pressure",
            Self::Chol => "Cholesterol",
            Self::Fbs => "Fasting Blood Sugar",
            Self::Restecg => "Resting ECG",
            Self::Thalachh => "Maximum Heart Rate",
            Self::Exang => "Exercise Induced Angina",
            Self::Oldpeak => "ST Depression",
            Self::Slope => "Slope",
            Self::Ca => "Number of Vessels",
            Self::Thal => "Thalassemia",
        }
    }

    /// Inclusive `(min, max)` bounds, `None` for identity fields.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            Self::PatientName | Self::PatientId => None,
            Self::Age => Some((1.0, 120.0)),
            Self::Sex => Some((0.0, 1.0)),
            Self::Cp => Some((0.0, 3.0)),
            Self::Trestbps => Some((50.0, 250.0)),
            Self::Chol => Some((30.0, 1000.0)),
            Self::Fbs => Some((0.0, 1.0)),
            Self::Restecg => Some((0.0, 2.0)),
            Self::Thalachh => Some((40.0, 220.0)),
            Self::Exang => Some((0.0, 1.0)),
            Self::Oldpeak => Some((0.0, 6.2)),
            Self::Slope => Some((0.0, 2.0)),
            Self::Ca => Some((0.0, 4.0)),
            Self::Thal => Some((0.0, 3.0)),
        }
    }

    #[must_use]
    pub fn is_clinical(&self) -> bool {
        self.range().is_some()
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw clinical inputs as entered on the form. Any value may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalInputs {
    /// Age in years
    pub age: Option<f64>,
    /// 1 = male, 0 = female
    pub sex: Option<f64>,
    /// Chest pain type (0-3)
    pub cp: Option<f64>,
    /// Resting blood pressure in mm Hg
    pub trestbps: Option<f64>,
    /// Serum cholesterol in mg/dl
    pub chol: Option<f64>,
    /// Fasting blood sugar > 120 mg/dl flag
    pub fbs: Option<f64>,
    /// Resting electrocardiographic result (0-2)
    pub restecg: Option<f64>,
    /// Maximum heart rate achieved
    pub thalachh: Option<f64>,
    /// Exercise induced angina flag
    pub exang: Option<f64>,
    /// ST depression induced by exercise relative to rest
    pub oldpeak: Option<f64>,
    /// Slope of the peak exercise ST segment (0-2)
    pub slope: Option<f64>,
    /// Number of major vessels colored by fluoroscopy (0-4)
    pub ca: Option<f64>,
    /// Thalassemia (0-3)
    pub thal: Option<f64>,
}

impl ClinicalInputs {
    /// Value entered for a clinical field. Identity fields always yield `None`.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::PatientName | Field::PatientId => None,
            Field::Age => self.age,
            Field::Sex => self.sex,
            Field::Cp => self.cp,
            Field::Trestbps => self.trestbps,
            Field::Chol => self.chol,
            Field::Fbs => self.fbs,
            Field::Restecg => self.restecg,
            Field::Thalachh => self.thalachh,
            Field::Exang => self.exang,
            Field::Oldpeak => self.oldpeak,
            Field::Slope => self.slope,
            Field::Ca => self.ca,
            Field::Thal => self.thal,
        }
    }

    /// All 13 values, or `None` if any is missing.
    #[must_use]
    pub fn complete(&self) -> Option<ClinicalFeatures> {
        let mut values = [0.0; CLINICAL_FEATURE_COUNT];
        for (slot, field) in values.iter_mut().zip(Field::CLINICAL) {
            *slot = self.get(field)?;
        }
        Some(ClinicalFeatures::from_array(values))
    }
}

/// A complete set of clinical features, pre-scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFeatures {
    pub age: f64,
    pub sex: f64,
    pub cp: f64,
    pub trestbps: f64,
    pub chol: f64,
    pub fbs: f64,
    pub restecg: f64,
    pub thalachh: f64,
    pub exang: f64,
    pub oldpeak: f64,
    pub slope: f64,
    pub ca: f64,
    pub thal: f64,
}

impl ClinicalFeatures {
    /// Feature vector in model order.
    #[must_use]
    pub fn to_array(&self) -> [f64; CLINICAL_FEATURE_COUNT] {
        [
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalachh,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }

    #[must_use]
    pub fn from_array(v: [f64; CLINICAL_FEATURE_COUNT]) -> Self {
        Self {
            age: v[0],
            sex: v[1],
            cp: v[2],
            trestbps: v[3],
            chol: v[4],
            fbs: v[5],
            restecg: v[6],
            thalachh: v[7],
            exang: v[8],
            oldpeak: v[9],
            slope: v[10],
            ca: v[11],
            thal: v[12],
        }
    }

    /// Back to the nullable form used for session field restoration.
    #[must_use]
    pub fn to_inputs(&self) -> ClinicalInputs {
        ClinicalInputs {
            age: Some(self.age),
            sex: Some(self.sex),
            cp: Some(self.cp),
            trestbps: Some(self.trestbps),
            chol: Some(self.chol),
            fbs: Some(self.fbs),
            restecg: Some(self.restecg),
            thalachh: Some(self.thalachh),
            exang: Some(self.exang),
            oldpeak: Some(self.oldpeak),
            slope: Some(self.slope),
            ca: Some(self.ca),
            thal: Some(self.thal),
        }
    }
}

/// One submitted assessment form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientObservation {
    #[serde(default)]
    pub patient_name: Option<String>,

    #[serde(default)]
    pub patient_id: Option<String>,

    #[serde(flatten)]
    pub clinical: ClinicalInputs,
}

impl PatientObservation {
    #[must_use]
    pub fn new(
        patient_name: impl Into<String>,
        patient_id: impl Into<String>,
        clinical: ClinicalInputs,
    ) -> Self {
        Self {
            patient_name: Some(patient_name.into()),
            patient_id: Some(patient_id.into()),
            clinical,
        }
    }

    /// Trimmed patient name, `None` when absent or blank.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        non_blank(self.patient_name.as_deref())
    }

    /// Trimmed patient identifier, `None` when absent or blank.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        non_blank(self.patient_id.as_deref())
    }

    /// Identity plus complete features, if every field is present.
    ///
    /// Presence only: ranges are the validation engine's concern.
    #[must_use]
    pub fn to_validated(&self) -> Option<ValidatedObservation> {
        Some(ValidatedObservation {
            patient_name: self.name()?.to_string(),
            patient_id: self.id()?.to_string(),
            features: self.clinical.complete()?,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Observation with trimmed identity and all clinical values present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedObservation {
    pub patient_name: String,
    pub patient_id: String,
    pub features: ClinicalFeatures,
}
