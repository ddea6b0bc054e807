use std::collections::HashMap;
use ndarray::{Array1, Array2, Array4};
use ort::session::Session;
use ort::value::Tensor;
use log::{debug, error};

use super::builder::{InputBinding, LoadOutcome};
use super::error::ClassifierError;
use super::metadata::{build_features, PatientMetadata};
use super::prediction::{ClassProbabilities, Prediction, PredictionResponse};
use super::preprocess::{preprocess_image, PreprocessConfig};
use super::{ModelInfo, CLASS_NAMES, META_FEATURES};
use crate::runtime::Device;

/// A skin-lesion classifier bound to an ONNX session.
///
/// Built once by [`ModelLoader`](super::builder::ModelLoader) and then shared
/// by reference. All inference goes through `&self`, so the model can sit
/// behind an `Arc` in a service.
#[derive(Debug)]
pub struct LoadedModel {
    model_path: String,
    session: Session,
    binding: InputBinding,
    outcome: LoadOutcome,
    device: Device,
    preprocess: PreprocessConfig,
    image_size: (u32, u32),
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<LoadedModel>();
    }
};

impl LoadedModel {
    pub(crate) fn new(
        model_path: String,
        session: Session,
        binding: InputBinding,
        outcome: LoadOutcome,
        device: Device,
        preprocess: PreprocessConfig,
        image_size: (u32, u32),
    ) -> Self {
        Self {
            model_path,
            session,
            binding,
            outcome,
            device,
            preprocess,
            image_size,
        }
    }

    /// Whether the model has a metadata branch
    pub fn uses_metadata(&self) -> bool {
        self.binding.uses_metadata()
    }

    pub fn outcome(&self) -> LoadOutcome {
        self.outcome
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_path: self.model_path.clone(),
            outcome: self.outcome,
            device: self.device,
            image_size: self.image_size,
            class_labels: CLASS_NAMES.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Classifies one image.
    ///
    /// Metadata is only fed to models with a metadata branch. Such models
    /// always need the input, so a call without metadata feeds the default
    /// vector and reports `metadata_used = false`.
    ///
    /// # Errors
    /// - `ImageError` / `ValidationError` if the bytes are not a usable image
    /// - `ModelError` if ONNX Runtime fails
    /// - `PredictionError` if the output is not one logit per class
    pub fn predict(
        &self,
        image_bytes: &[u8],
        metadata: Option<&PatientMetadata>,
    ) -> Result<Prediction, ClassifierError> {
        let (width, height) = self.image_size;
        let image = preprocess_image(image_bytes, width, height, &self.preprocess)?;

        let features = self.uses_metadata().then(|| build_features(metadata));
        let logits = self.forward(image, features.as_ref())?;
        let probabilities = ClassProbabilities::from_logits(logits.view())?;

        let metadata_used = self.uses_metadata() && metadata.is_some();
        Ok(Prediction::from_probabilities(
            probabilities,
            metadata_used,
            self.uses_metadata(),
        ))
    }

    /// Like [`predict`](Self::predict), but folds any failure into an error response.
    pub fn predict_response(
        &self,
        image_bytes: &[u8],
        metadata: Option<&PatientMetadata>,
    ) -> PredictionResponse {
        let result = self.predict(image_bytes, metadata);
        if let Err(e) = &result {
            error!("Prediction failed: {}", e);
        }
        result.into()
    }

    /// Runs a single forward pass and returns the raw class logits.
    ///
    /// # Model Input Format
    /// - image: `[1, 3, H, W]` f32, normalized
    /// - metadata (optional): `[1, 11]` f32
    pub fn forward(
        &self,
        image: Array4<f32>,
        features: Option<&[f32; META_FEATURES]>,
    ) -> Result<Array1<f32>, ClassifierError> {
        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.binding.image_input.as_str(), Tensor::from_array(image)?);

        if let Some(meta_input) = &self.binding.meta_input {
            let features = features.copied().unwrap_or_else(|| build_features(None));
            let meta_array = Array2::from_shape_vec((1, META_FEATURES), features.to_vec())
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create metadata array: {}", e)))?;
            input_tensors.insert(meta_input.as_str(), Tensor::from_array(meta_array)?);
        }

        let outputs = self.session.run(input_tensors)?;
        let output_tensor = outputs[self.binding.output.as_str()].try_extract_tensor::<f32>()?;
        debug!("Model output shape: {:?}", output_tensor.shape());

        // Batch size is one, so the flattened output is the logit vector
        Ok(output_tensor.iter().copied().collect())
    }
}
