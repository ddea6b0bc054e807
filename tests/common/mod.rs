//! Tiny ONNX classifiers written to disk for the integration tests.
//!
//! The graphs compute `flatten(image) x W_img (+ meta x W_meta) + bias` over
//! an 8x8 image. The image weights are zero, so the logits only depend on the
//! metadata and the bias, which makes the expected predictions easy to reason
//! about.
#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;

use skinsight::{MELANOMA_INDEX, META_FEATURES, NUM_CLASSES};

/// Spatial size pinned by the fixture's image input
pub const IMAGE_SIZE: i64 = 8;

/// Weight from the sex slot to the melanoma logit. Male (1.0) pushes towards
/// melanoma, the unknown default (-1.0) pushes away from it.
pub const SEX_TO_MELANOMA: f32 = 6.0;

/// Bias on the nevus logit in the image-only fixture
pub const NEVUS_BIAS: f32 = 4.0;

const NEVUS_INDEX: usize = 3;
const FLOAT: i64 = 1;

#[derive(Default)]
struct Proto(Vec<u8>);

impl Proto {
    fn varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.0.push(byte);
                return;
            }
            self.0.push(byte | 0x80);
        }
    }

    fn key(&mut self, field: u64, wire_type: u64) {
        self.varint((field << 3) | wire_type);
    }

    fn int(mut self, field: u64, value: i64) -> Self {
        self.key(field, 0);
        self.varint(value as u64);
        self
    }

    fn bytes(mut self, field: u64, data: &[u8]) -> Self {
        self.key(field, 2);
        self.varint(data.len() as u64);
        self.0.extend_from_slice(data);
        self
    }

    fn string(self, field: u64, value: &str) -> Self {
        self.bytes(field, value.as_bytes())
    }

    fn message(self, field: u64, message: Proto) -> Self {
        self.bytes(field, &message.0)
    }
}

/// A float tensor value info. Negative dims become the symbolic batch dim.
fn value_info(name: &str, dims: &[i64]) -> Proto {
    let shape = dims.iter().fold(Proto::default(), |shape, &d| {
        let dim = if d < 0 {
            Proto::default().string(2, "N")
        } else {
            Proto::default().int(1, d)
        };
        shape.message(1, dim)
    });
    let tensor_type = Proto::default().int(1, FLOAT).message(2, shape);
    Proto::default()
        .string(1, name)
        .message(2, Proto::default().message(1, tensor_type))
}

fn initializer(name: &str, dims: &[i64], values: &[f32]) -> Proto {
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    dims.iter()
        .fold(Proto::default(), |tensor, &d| tensor.int(1, d))
        .int(2, FLOAT)
        .string(8, name)
        .bytes(9, &raw)
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> Proto {
    let node = inputs
        .iter()
        .fold(Proto::default(), |node, input| node.string(1, input));
    node.string(2, output).string(3, output).string(4, op_type)
}

fn model_bytes(with_metadata: bool, properties: &[(&str, &str)]) -> Vec<u8> {
    let pixels = 3 * IMAGE_SIZE * IMAGE_SIZE;
    let classes = NUM_CLASSES as i64;

    let mut bias = vec![0.0f32; NUM_CLASSES];
    if !with_metadata {
        bias[NEVUS_INDEX] = NEVUS_BIAS;
    }

    let mut graph = Proto::default()
        .message(1, node("Flatten", &["image"], "flat"))
        .message(1, node("MatMul", &["flat", "w_image"], "image_logits"));
    let head = if with_metadata {
        graph = graph
            .message(1, node("MatMul", &["meta", "w_meta"], "meta_logits"))
            .message(1, node("Add", &["image_logits", "meta_logits"], "joint_logits"));
        "joint_logits"
    } else {
        "image_logits"
    };
    graph = graph
        .message(1, node("Add", &[head, "bias"], "logits"))
        .string(2, "skinsight-fixture")
        .message(
            5,
            initializer(
                "w_image",
                &[pixels, classes],
                &vec![0.0; (pixels * classes) as usize],
            ),
        )
        .message(5, initializer("bias", &[classes], &bias))
        .message(11, value_info("image", &[-1, 3, IMAGE_SIZE, IMAGE_SIZE]));

    if with_metadata {
        let mut w_meta = vec![0.0f32; META_FEATURES * NUM_CLASSES];
        // row 0 is the sex slot
        w_meta[MELANOMA_INDEX] = SEX_TO_MELANOMA;
        graph = graph
            .message(5, initializer("w_meta", &[META_FEATURES as i64, classes], &w_meta))
            .message(11, value_info("meta", &[-1, META_FEATURES as i64]));
    }
    graph = graph.message(12, value_info("logits", &[-1, classes]));

    let opset = Proto::default().string(1, "").int(2, 13);
    let model = properties.iter().fold(
        Proto::default()
            .int(1, 8)
            .string(2, "skinsight-tests")
            .message(7, graph)
            .message(8, opset),
        |model, (key, value)| {
            model.message(14, Proto::default().string(1, key).string(2, value))
        },
    );
    model.0
}

/// Writes a fixture model under the temp dir and returns its path.
///
/// `name` must be unique per test, since tests run in parallel.
pub fn write_model(name: &str, with_metadata: bool, properties: &[(&str, &str)]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "skinsight-{}-{}.onnx",
        name,
        std::process::id()
    ));
    std::fs::write(&path, model_bytes(with_metadata, properties)).expect("write fixture model");
    path
}

pub fn metadata_model(name: &str) -> PathBuf {
    write_model(name, true, &[])
}

pub fn image_only_model(name: &str) -> PathBuf {
    write_model(name, false, &[])
}

/// A uniformly coloured PNG, larger than the fixture so it gets resized
pub fn lesion_png() -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 24, Rgb([150, 90, 70]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}
