use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};

use skinsight::{
    init_logger, ModelCache, ModelLoader, PatientMetadata, PredictionResponse, PreprocessConfig,
    RuntimeConfig,
};

const USAGE_ERROR: &str =
    "Invalid arguments. Usage: predict <model_path> <image_path> [metadata_json]";
const METADATA_ERROR: &str = "Invalid metadata JSON format";

#[derive(Parser)]
#[command(name = "predict", author, version, about = "Classify a skin-lesion image", long_about = None)]
struct Args {
    /// Path to the ONNX model file
    model_path: PathBuf,

    /// Path to the image to classify
    image_path: PathBuf,

    /// Patient metadata as a JSON object, e.g. '{"sex": "male", "age_approx": 50}'
    metadata_json: Option<String>,

    /// Side length images are resized to when the model does not fix one
    #[arg(long, env = "SKINSIGHT_IMAGE_SIZE")]
    image_size: Option<u32>,

    /// Number of intra-op threads (0 lets ONNX Runtime decide)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Trust the model's own description instead of the EfficientNet-b3 layout
    #[arg(long)]
    self_describing: bool,

    /// Never run on an accelerator
    #[arg(long)]
    cpu: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(&'static str),
    #[error("{0:#}")]
    Failed(#[from] anyhow::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Usage(_) => ExitCode::from(2),
            CliError::Failed(_) => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    init_logger();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            error!("{}", e.kind());
            let err = CliError::Usage(USAGE_ERROR);
            emit(&PredictionResponse::error(err.to_string()), false);
            return err.exit_code();
        }
    };

    match run(&args) {
        Ok(response) => {
            emit(&response, args.pretty);
            if response.is_error() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Error during prediction: {}", e);
            emit(&PredictionResponse::error(e.to_string()), args.pretty);
            e.exit_code()
        }
    }
}

fn run(args: &Args) -> Result<PredictionResponse, CliError> {
    // Metadata is validated before touching the image or the model
    let metadata = match &args.metadata_json {
        Some(raw) => PatientMetadata::from_json_str(raw).map_err(|e| {
            error!("{}", e);
            CliError::Usage(METADATA_ERROR)
        })?,
        None => None,
    };

    let image_bytes = fs::read(&args.image_path)
        .with_context(|| format!("Failed to read image {}", args.image_path.display()))?;

    info!("Loading model...");
    let model = ModelCache::global()
        .get_or_load(Some(args.model_path.as_path()), &loader_for(args))
        .context("Failed to load model")?
        .context("Model is not loaded")?;
    info!("Model loaded successfully");
    info!("Model metadata support: {}", model.uses_metadata());
    log::debug!("{:?}", model.info());

    info!("Making prediction...");
    let response = model.predict_response(&image_bytes, metadata.as_ref());
    info!("Prediction completed");

    Ok(response)
}

fn loader_for(args: &Args) -> ModelLoader {
    let runtime_config = RuntimeConfig {
        intra_threads: args.threads,
        prefer_accelerator: !args.cpu,
        ..RuntimeConfig::default()
    };
    let mut preprocess_config = PreprocessConfig::default();
    if let Some(size) = args.image_size {
        preprocess_config = preprocess_config.with_image_size(size);
    }

    let loader = ModelLoader::new()
        .with_runtime_config(runtime_config)
        .with_preprocess_config(preprocess_config);
    if args.self_describing {
        loader.self_describing()
    } else {
        loader
    }
}

/// Writes the single JSON result line to stdout
fn emit(response: &PredictionResponse, pretty: bool) {
    if pretty {
        println!("{}", response.to_json_pretty());
    } else {
        println!("{}", response.to_json());
    }
}
