use ndarray::ArrayView1;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::error::ClassifierError;
use super::utils::{argmax, softmax};
use super::{CLASS_NAMES, MELANOMA_INDEX, NUM_CLASSES};

/// Probability threshold a class has to exceed to be reported.
const DECISION_THRESHOLD: f32 = 0.5;

/// Softmax probabilities over [`CLASS_NAMES`], serialized as a label-ordered map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities([f32; NUM_CLASSES]);

impl ClassProbabilities {
    /// Wraps an already-normalized probability vector.
    pub fn new(probabilities: [f32; NUM_CLASSES]) -> Self {
        Self(probabilities)
    }

    /// Applies softmax to raw classifier logits.
    ///
    /// A NaN logit means the forward pass produced no usable answer and is
    /// reported as a `PredictionError`.
    pub fn from_logits(logits: ArrayView1<f32>) -> Result<Self, ClassifierError> {
        if logits.len() != NUM_CLASSES {
            return Err(ClassifierError::PredictionError(format!(
                "Expected {} class logits, model produced {}",
                NUM_CLASSES,
                logits.len()
            )));
        }
        if let Some(i) = logits.iter().position(|x| x.is_nan()) {
            return Err(ClassifierError::PredictionError(format!(
                "Model produced a NaN logit for class {}",
                CLASS_NAMES[i]
            )));
        }
        let probs = softmax(logits);
        let mut out = [0.0f32; NUM_CLASSES];
        for (slot, p) in out.iter_mut().zip(probs.iter()) {
            *slot = *p;
        }
        Ok(Self(out))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        CLASS_NAMES.iter().position(|l| *l == label).map(|i| self.0[i])
    }

    pub fn melanoma(&self) -> f32 {
        self.0[MELANOMA_INDEX]
    }

    /// Applies the reporting rule.
    ///
    /// A non-melanoma class wins outright when it is the most likely class and
    /// clears the threshold. Otherwise the call is binary: melanoma against
    /// everything else, with confidence `max(p, 1 - p)`.
    pub fn decide(&self) -> Decision {
        let top = argmax(&self.0);
        let top_prob = self.0[top];
        if top != MELANOMA_INDEX && top_prob > DECISION_THRESHOLD {
            return Decision {
                label: CLASS_NAMES[top].to_uppercase(),
                confidence: top_prob,
            };
        }

        let mel = self.melanoma();
        if mel > DECISION_THRESHOLD {
            Decision {
                label: "Melanoma".to_string(),
                confidence: mel,
            }
        } else {
            Decision {
                label: "Non-Melanoma".to_string(),
                confidence: 1.0 - mel,
            }
        }
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (label, p) in CLASS_NAMES.iter().zip(self.0.iter()) {
            map.serialize_entry(label, p)?;
        }
        map.end()
    }
}

/// Human-readable outcome of [`ClassProbabilities::decide`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MelanomaProbabilities {
    pub melanoma: f32,
    pub non_melanoma: f32,
}

/// A successful classification, as printed on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f32,
    pub probabilities: MelanomaProbabilities,
    pub all_probabilities: ClassProbabilities,
    /// Metadata was supplied by the caller and fed to the model
    pub metadata_used: bool,
    /// The loaded model has a metadata branch at all
    pub metadata_supported: bool,
}

impl Prediction {
    pub fn from_probabilities(
        probabilities: ClassProbabilities,
        metadata_used: bool,
        metadata_supported: bool,
    ) -> Self {
        let decision = probabilities.decide();
        let melanoma = probabilities.melanoma();
        Self {
            prediction: decision.label,
            confidence: decision.confidence,
            probabilities: MelanomaProbabilities {
                melanoma,
                non_melanoma: 1.0 - melanoma,
            },
            all_probabilities: probabilities,
            metadata_used,
            metadata_supported,
        }
    }
}

/// The single JSON object written to the result channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success(Prediction),
    Failure { error: String },
}

impl PredictionResponse {
    pub fn error(message: impl Into<String>) -> Self {
        PredictionResponse::Failure {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictionResponse::Failure { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| fallback_error(&e))
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| fallback_error(&e))
    }
}

impl From<Result<Prediction, ClassifierError>> for PredictionResponse {
    fn from(result: Result<Prediction, ClassifierError>) -> Self {
        match result {
            Ok(prediction) => PredictionResponse::Success(prediction),
            Err(e) => PredictionResponse::error(e.to_string()),
        }
    }
}

fn fallback_error(err: &serde_json::Error) -> String {
    serde_json::json!({ "error": format!("Failed to serialize result: {}", err) }).to_string()
}
