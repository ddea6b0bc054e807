//! Skin-lesion classification with a pretrained EfficientNet exported to ONNX.
//!
//! The model is loaded once, bound either with or without its patient-metadata
//! branch, and then used to turn a dermoscopy image into probabilities over
//! nine diagnostic categories.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use skinsight::{ModelLoader, PatientMetadata};
//!
//! let model = ModelLoader::new().load("model.onnx")?;
//!
//! let image = std::fs::read("lesion.jpg")?;
//! let metadata = PatientMetadata::from_json_str(r#"{"sex": "female", "age_approx": 55}"#)?;
//!
//! let prediction = model.predict(&image, metadata.as_ref())?;
//! println!("{} ({:.1}%)", prediction.prediction, prediction.confidence * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Shared Model
//!
//! Long-lived processes should load through [`ModelCache`], which builds the
//! model exactly once even when several threads ask for it at the same time:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use skinsight::{ModelCache, ModelLoader};
//! use std::path::Path;
//!
//! let model = ModelCache::global()
//!     .get_or_load(Some(Path::new("model.onnx")), &ModelLoader::new())?
//!     .expect("a path was given");
//! println!("metadata support: {}", model.uses_metadata());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
mod runtime;
pub mod model_manager;

pub use classifier::{
    build_features, softmax, Architecture, ClassProbabilities, ClassifierError, Decision,
    LoadError, LoadOutcome, LoadedModel, ModelInfo, ModelLoader, ModelSignature, PatientMetadata,
    Prediction, PredictionResponse, PreprocessConfig, Sex, ANATOMIC_SITES, CLASS_NAMES,
    MELANOMA_INDEX, META_FEATURES, NUM_CLASSES,
};
pub use runtime::{Device, RuntimeConfig, create_session_builder, selected_device};
pub use model_manager::ModelCache;

/// Sends log output to stderr, defaulting to `info` unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
