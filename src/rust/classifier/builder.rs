use std::path::Path;
use ort::session::Session;
use ort::value::ValueType;
use log::{info, warn};

use super::error::LoadError;
use super::model::LoadedModel;
use super::preprocess::PreprocessConfig;
use super::{META_FEATURES, NUM_CLASSES};
use crate::runtime::{create_session_builder, ensure_initialized, RuntimeConfig};

/// Custom model property a self-describing export uses to declare its metadata width.
pub const META_FEATURES_PROPERTY: &str = "n_meta_features";

/// Name and dimensions of one graph input or output. Dynamic dimensions are negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub dims: Vec<i64>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, dims: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// True when `dim` is either dynamic or equal to `expected`
    fn dim_accepts(&self, index: usize, expected: i64) -> bool {
        self.dims.get(index).is_some_and(|&d| d < 0 || d == expected)
    }

    fn static_dim(&self, index: usize) -> Option<u32> {
        self.dims
            .get(index)
            .filter(|&&d| d > 0)
            .and_then(|&d| u32::try_from(d).ok())
    }
}

/// Everything the loader needs to know about an opened model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSignature {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    /// Value of the `n_meta_features` property, if the export carries one
    pub n_meta_features: Option<usize>,
}

impl ModelSignature {
    pub fn from_session(session: &Session) -> Result<Self, LoadError> {
        let inputs = session
            .inputs
            .iter()
            .map(|input| TensorSpec::new(input.name.clone(), tensor_dims(&input.input_type)))
            .collect();
        let outputs = session
            .outputs
            .iter()
            .map(|output| TensorSpec::new(output.name.clone(), tensor_dims(&output.output_type)))
            .collect();

        let n_meta_features = match session.metadata()?.custom(META_FEATURES_PROPERTY)? {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("Ignoring unparsable {} property: {:?}", META_FEATURES_PROPERTY, raw);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            inputs,
            outputs,
            n_meta_features,
        })
    }

    /// The first rank-4 input with three (or dynamic) channels
    fn image_input(&self) -> Option<&TensorSpec> {
        self.inputs
            .iter()
            .find(|input| input.rank() == 4 && input.dim_accepts(1, 3))
    }

    fn other_inputs<'a>(&'a self, image: &'a TensorSpec) -> impl Iterator<Item = &'a TensorSpec> {
        self.inputs.iter().filter(move |input| input.name != image.name)
    }

    /// The first output whose last dimension can hold `num_classes` logits
    fn logits_output(&self, num_classes: usize) -> Option<&TensorSpec> {
        self.outputs.iter().find(|output| {
            output.rank() >= 1 && output.dim_accepts(output.rank() - 1, num_classes as i64)
        })
    }
}

fn tensor_dims(value_type: &ValueType) -> Vec<i64> {
    match value_type {
        ValueType::Tensor { dimensions, .. } => dimensions.clone(),
        _ => Vec::new(),
    }
}

/// Resolved graph names the predictor feeds and reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub image_input: String,
    pub meta_input: Option<String>,
    pub output: String,
    /// (width, height) when the graph pins its spatial size
    pub image_size: Option<(u32, u32)>,
}

impl InputBinding {
    pub fn uses_metadata(&self) -> bool {
        self.meta_input.is_some()
    }
}

/// Which loading strategy produced the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Bound to the architecture with its metadata branch
    WithMetadata,
    /// The metadata binding failed; bound to the image-only variant
    WithoutMetadata,
    /// No architecture configured; the model's own description was trusted
    SelfDescribing { uses_metadata: bool },
}

impl LoadOutcome {
    pub fn uses_metadata(&self) -> bool {
        match self {
            LoadOutcome::WithMetadata => true,
            LoadOutcome::WithoutMetadata => false,
            LoadOutcome::SelfDescribing { uses_metadata } => *uses_metadata,
        }
    }
}

/// Expected shape of the exported classifier: a CNN backbone with a linear
/// head, optionally concatenated with an encoder over patient metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    pub name: String,
    pub num_classes: usize,
    pub n_meta_features: usize,
}

impl Architecture {
    /// EfficientNet-b3 with the 9-class head and the 11-wide metadata encoder
    pub fn efficientnet_b3() -> Self {
        Self {
            name: "efficientnet-b3".to_string(),
            num_classes: NUM_CLASSES,
            n_meta_features: META_FEATURES,
        }
    }

    /// Matches a signature against this architecture, with or without its metadata branch.
    pub fn bind(&self, signature: &ModelSignature, with_metadata: bool) -> Result<InputBinding, LoadError> {
        let variant = if with_metadata {
            format!("{} with {} metadata features", self.name, self.n_meta_features)
        } else {
            format!("{} without metadata", self.name)
        };

        let image = signature
            .image_input()
            .ok_or_else(|| LoadError::mismatch(&variant, "no [N, 3, H, W] image input"))?;
        let others: Vec<&TensorSpec> = signature.other_inputs(image).collect();

        let meta_input = if with_metadata {
            match others.as_slice() {
                [meta] if meta.rank() == 2 && meta.dim_accepts(1, self.n_meta_features as i64) => {
                    Some(meta.name.clone())
                }
                [meta] => {
                    return Err(LoadError::mismatch(
                        &variant,
                        format!("metadata input '{}' has shape {:?}", meta.name, meta.dims),
                    ))
                }
                [] => return Err(LoadError::mismatch(&variant, "model has no metadata input")),
                _ => {
                    return Err(LoadError::mismatch(
                        &variant,
                        format!("expected 2 inputs, found {}", signature.inputs.len()),
                    ))
                }
            }
        } else {
            if !others.is_empty() {
                return Err(LoadError::mismatch(
                    &variant,
                    format!("expected 1 input, found {}", signature.inputs.len()),
                ));
            }
            None
        };

        let output = signature
            .logits_output(self.num_classes)
            .ok_or_else(|| LoadError::mismatch(&variant, format!("no output with {} classes", self.num_classes)))?;

        Ok(InputBinding {
            image_input: image.name.clone(),
            meta_input,
            output: output.name.clone(),
            image_size: image.static_dim(3).zip(image.static_dim(2)),
        })
    }

    /// Trusts the model to describe itself: metadata is used when the export
    /// declares `n_meta_features > 0`, or when it is silent and has a second input.
    pub fn bind_self_describing(signature: &ModelSignature, num_classes: usize) -> Result<InputBinding, LoadError> {
        let name = "self-describing model";
        let image = signature
            .image_input()
            .ok_or_else(|| LoadError::mismatch(name, "no [N, 3, H, W] image input"))?;
        let meta = signature.other_inputs(image).find(|input| input.rank() == 2);

        let uses_metadata = match signature.n_meta_features {
            Some(n) => n > 0,
            None => meta.is_some(),
        };
        let meta_input = match (uses_metadata, meta) {
            (true, Some(meta)) => Some(meta.name.clone()),
            (true, None) => {
                return Err(LoadError::mismatch(name, "declares metadata features but has no metadata input"))
            }
            (false, Some(meta)) => {
                return Err(LoadError::mismatch(
                    name,
                    format!("declares no metadata features but has input '{}'", meta.name),
                ))
            }
            (false, None) => None,
        };

        let output = signature
            .logits_output(num_classes)
            .ok_or_else(|| LoadError::mismatch(name, format!("no output with {} classes", num_classes)))?;

        Ok(InputBinding {
            image_input: image.name.clone(),
            meta_input,
            output: output.name.clone(),
            image_size: image.static_dim(3).zip(image.static_dim(2)),
        })
    }
}

/// Loads a classifier and decides how to feed it.
///
/// # Example
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use skinsight::{ModelLoader, RuntimeConfig};
///
/// let model = ModelLoader::new()
///     .with_runtime_config(RuntimeConfig::default())
///     .load("model.onnx")?;
/// println!("metadata support: {}", model.uses_metadata());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ModelLoader {
    runtime_config: RuntimeConfig,
    preprocess_config: PreprocessConfig,
    architecture: Option<Architecture>,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    /// Creates a loader for the EfficientNet-b3 architecture with default runtime settings
    pub fn new() -> Self {
        Self {
            runtime_config: RuntimeConfig::default(),
            preprocess_config: PreprocessConfig::default(),
            architecture: Some(Architecture::efficientnet_b3()),
        }
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn with_preprocess_config(mut self, config: PreprocessConfig) -> Self {
        self.preprocess_config = config;
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    /// Skips architecture binding and trusts the model's own description
    pub fn self_describing(mut self) -> Self {
        self.architecture = None;
        self
    }

    /// Picks a binding for the signature.
    ///
    /// With an architecture configured this tries the metadata variant first
    /// and the image-only variant second. Both failures are reported together.
    pub fn resolve(&self, signature: &ModelSignature) -> Result<(LoadOutcome, InputBinding), LoadError> {
        let architecture = match &self.architecture {
            Some(architecture) => architecture,
            None => {
                let binding = Architecture::bind_self_describing(signature, NUM_CLASSES)?;
                let outcome = LoadOutcome::SelfDescribing {
                    uses_metadata: binding.uses_metadata(),
                };
                return Ok((outcome, binding));
            }
        };

        let with_metadata = match architecture.bind(signature, true) {
            Ok(binding) => return Ok((LoadOutcome::WithMetadata, binding)),
            Err(e) => e,
        };
        warn!("Failed to load model with metadata: {}", with_metadata);
        info!("Trying to load model without metadata...");

        match architecture.bind(signature, false) {
            Ok(binding) => Ok((LoadOutcome::WithoutMetadata, binding)),
            Err(without_metadata) => Err(LoadError::Exhausted {
                with_metadata: Box::new(with_metadata),
                without_metadata: Box::new(without_metadata),
            }),
        }
    }

    /// Opens the model at `path` and binds it.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - `RuntimeError` if ONNX Runtime cannot parse the file
    /// - `Exhausted` / `ArchitectureMismatch` if no binding fits
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedModel, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.display().to_string()));
        }

        let device = ensure_initialized(self.runtime_config.prefer_accelerator)?;
        let session = create_session_builder(&self.runtime_config)?.commit_from_file(path)?;

        let signature = ModelSignature::from_session(&session)?;
        let (outcome, binding) = self.resolve(&signature)?;
        if outcome.uses_metadata() {
            info!("Loaded model with metadata support");
        } else {
            info!("Loaded model without metadata support");
        }

        let image_size = binding
            .image_size
            .unwrap_or((self.preprocess_config.image_size, self.preprocess_config.image_size));

        Ok(LoadedModel::new(
            path.display().to_string(),
            session,
            binding,
            outcome,
            device,
            self.preprocess_config.clone(),
            image_size,
        ))
    }
}
