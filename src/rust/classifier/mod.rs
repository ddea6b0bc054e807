mod error;
mod metadata;
mod model;
mod prediction;
mod preprocess;
pub mod builder;
mod utils;

pub use error::{ClassifierError, LoadError};
pub use metadata::{build_features, PatientMetadata, Sex};
pub use model::LoadedModel;
pub use prediction::{ClassProbabilities, Decision, MelanomaProbabilities, Prediction, PredictionResponse};
pub use preprocess::{decode_image, image_to_tensor, preprocess_image, PreprocessConfig};
pub use builder::{Architecture, InputBinding, LoadOutcome, ModelLoader, ModelSignature, TensorSpec};
pub use utils::softmax;

use crate::runtime::Device;

/// Diagnostic categories in output-index order. Must match the order the weights were trained with.
pub const CLASS_NAMES: [&str; 9] = ["BKL", "DF", "melanoma", "nevus", "SCC", "VASC", "AK", "BCC", "unknown"];

/// Number of classes produced by the classifier head
pub const NUM_CLASSES: usize = CLASS_NAMES.len();

/// Index of "melanoma" in [`CLASS_NAMES`]
pub const MELANOMA_INDEX: usize = 2;

/// Anatomic sites in one-hot order. The last slot doubles as the fallback for unrecognised sites.
pub const ANATOMIC_SITES: [&str; 7] = [
    "head/neck",
    "oral/genital",
    "palms/soles",
    "torso",
    "upper extremity",
    "lower extremity",
    "unknown",
];

/// Length of the metadata feature vector: sex, age, image count, image size, then the site one-hot
pub const META_FEATURES: usize = 4 + ANATOMIC_SITES.len();

/// Information about a loaded model and how it was bound
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Path the model was loaded from
    pub model_path: String,
    /// Which loading strategy succeeded
    pub outcome: LoadOutcome,
    /// Device the session runs on
    pub device: Device,
    /// Side length images are resized to before inference
    pub image_size: (u32, u32),
    /// Labels of the classes, in output order
    pub class_labels: Vec<String>,
}
