use serde_json::Value;

use super::error::ClassifierError;
use super::{ANATOMIC_SITES, META_FEATURES};

/// Age that maps to 1.0 after normalization. Older ages are clamped.
const AGE_SCALE: f32 = 90.0;

/// Patient sex as recorded alongside the lesion image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// Parses case-insensitively. Anything other than male/female is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" => Sex::Male,
            "female" => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn code(self) -> f32 {
        match self {
            Sex::Male => 1.0,
            Sex::Female => 0.0,
            Sex::Unknown => -1.0,
        }
    }
}

/// Optional patient information fed to models with a metadata branch.
///
/// Every field is lenient: values of the wrong type or outside the known
/// vocabulary fall back to the same defaults as a missing field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientMetadata {
    pub sex: Sex,
    /// Approximate age in years, already validated as finite and non-negative
    pub age_approx: Option<f32>,
    /// General anatomic site, lower-cased
    pub anatom_site_general: Option<String>,
}

impl PatientMetadata {
    /// Parses the metadata argument.
    ///
    /// `null` means no metadata. Anything that is not JSON, or is JSON but not
    /// an object, is rejected.
    pub fn from_json_str(raw: &str) -> Result<Option<Self>, ClassifierError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::MetadataError(e.to_string()))?;
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => Ok(Some(Self::from_json_value(&value))),
            other => Err(ClassifierError::MetadataError(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Builds metadata from a JSON object, ignoring unknown keys and malformed values.
    pub fn from_json_value(value: &Value) -> Self {
        let sex = value
            .get("sex")
            .and_then(Value::as_str)
            .map(Sex::parse)
            .unwrap_or_default();

        let age_approx = value.get("age_approx").and_then(parse_age);

        let anatom_site_general = value
            .get("anatom_site_general")
            .and_then(Value::as_str)
            .map(|site| site.trim().to_lowercase())
            .filter(|site| !site.is_empty());

        Self {
            sex,
            age_approx,
            anatom_site_general,
        }
    }

    /// Age scaled into [0, 1]
    pub fn normalized_age(&self) -> f32 {
        self.age_approx
            .map(|age| (age / AGE_SCALE).min(1.0))
            .unwrap_or(0.0)
    }

    /// One-hot slot for the anatomic site, falling back to "unknown"
    pub fn site_index(&self) -> usize {
        self.anatom_site_general
            .as_deref()
            .and_then(|site| ANATOMIC_SITES.iter().position(|known| *known == site))
            .unwrap_or(ANATOMIC_SITES.len() - 1)
    }

    pub fn feature_vector(&self) -> [f32; META_FEATURES] {
        build_features(Some(self))
    }
}

/// Accepts numbers and numeric strings. Negative and non-finite ages are
/// treated as missing, so they encode as 0 rather than as a negative
/// `age / 90`.
fn parse_age(value: &Value) -> Option<f32> {
    let age = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let age = age as f32;
    (age.is_finite() && age >= 0.0).then_some(age)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Assembles `[sex, age, n_images, image_size, site one-hot...]`.
///
/// Missing metadata yields the all-default vector: unknown sex, age 0 and the
/// "unknown" site.
pub fn build_features(metadata: Option<&PatientMetadata>) -> [f32; META_FEATURES] {
    let defaults = PatientMetadata::default();
    let metadata = metadata.unwrap_or(&defaults);

    let mut features = [0.0f32; META_FEATURES];
    features[0] = metadata.sex.code();
    features[1] = metadata.normalized_age();
    features[2] = 1.0; // single image per patient
    features[3] = 0.0; // image size is not known at inference time
    features[4 + metadata.site_index()] = 1.0;
    features
}
