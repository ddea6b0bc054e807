use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

use super::error::ClassifierError;

/// Side length used when the model does not pin its input size.
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize and normalization settings. These must match how the weights were trained.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl PreprocessConfig {
    pub fn with_image_size(mut self, image_size: u32) -> Self {
        self.image_size = image_size;
        self
    }
}

/// Decodes any format the `image` crate recognises and converts it to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ClassifierError> {
    if bytes.is_empty() {
        return Err(ClassifierError::ValidationError("Image data is empty".into()));
    }
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifierError::ValidationError(format!(
            "Image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.into_rgb8())
}

/// Resizes to `width x height` and lays the pixels out as a normalized `[1, 3, H, W]` tensor.
pub fn image_to_tensor(
    image: RgbImage,
    width: u32,
    height: u32,
    config: &PreprocessConfig,
) -> Array4<f32> {
    let resized = if image.dimensions() == (width, height) {
        image
    } else {
        DynamicImage::ImageRgb8(image)
            .resize_exact(width, height, FilterType::Triangle)
            .into_rgb8()
    };

    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - config.mean[c]) / config.std[c]
        },
    )
}

/// Decodes raw image bytes into the model's input tensor.
pub fn preprocess_image(
    bytes: &[u8],
    width: u32,
    height: u32,
    config: &PreprocessConfig,
) -> Result<Array4<f32>, ClassifierError> {
    if width == 0 || height == 0 {
        return Err(ClassifierError::ValidationError(format!(
            "Target image size must be positive, got {}x{}",
            width, height
        )));
    }
    let image = decode_image(bytes)?;
    Ok(image_to_tensor(image, width, height, config))
}
