use ndarray::Array1;
use skinsight::{
    softmax, ClassProbabilities, Prediction, PredictionResponse, CLASS_NAMES, MELANOMA_INDEX,
    NUM_CLASSES,
};

fn probabilities(pairs: &[(&str, f32)]) -> ClassProbabilities {
    let assigned: f32 = pairs.iter().map(|(_, p)| p).sum();
    let remaining = NUM_CLASSES - pairs.len();
    let mut probs = [(1.0 - assigned) / remaining as f32; NUM_CLASSES];
    for (label, p) in pairs {
        let idx = CLASS_NAMES.iter().position(|l| l == label).unwrap();
        probs[idx] = *p;
    }
    ClassProbabilities::new(probs)
}

#[test]
fn test_softmax_over_nine_classes_sums_to_one() {
    let cases = [
        vec![0.0f32; 9],
        vec![10.0, -10.0, 3.0, 2.0, 1.0, 0.0, -1.0, -2.0, -3.0],
        vec![-50.0, -49.0, -48.0, -47.0, -46.0, -45.0, -44.0, -43.0, -42.0],
        vec![88.0, 88.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    ];
    for logits in cases {
        let probs = softmax(Array1::from(logits).view());
        assert_eq!(probs.len(), NUM_CLASSES);
        assert!((probs.sum() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_melanoma_above_half() {
    let decision = probabilities(&[("melanoma", 0.6), ("nevus", 0.1)]).decide();
    assert_eq!(decision.label, "Melanoma");
    assert!((decision.confidence - 0.6).abs() < 1e-6);
}

#[test]
fn test_other_class_above_half_overrides() {
    let decision = probabilities(&[("melanoma", 0.3), ("BCC", 0.7)]).decide();
    assert_eq!(decision.label, "BCC");
    assert!((decision.confidence - 0.7).abs() < 1e-6);
}

#[test]
fn test_no_class_above_half() {
    let decision = probabilities(&[("melanoma", 0.4), ("nevus", 0.1), ("BKL", 0.1)]).decide();
    assert_eq!(decision.label, "Non-Melanoma");
    assert!((decision.confidence - 0.6).abs() < 1e-6);
}

#[test]
fn test_confidence_is_always_at_least_half() {
    for mel in [0.0f32, 0.05, 0.2, 0.45, 0.5, 0.55, 0.9, 1.0] {
        let decision = probabilities(&[("melanoma", mel)]).decide();
        assert!(decision.confidence >= 0.5 - 1e-6, "mel={}", mel);
        assert!(decision.confidence <= 1.0 + 1e-6, "mel={}", mel);
    }
}

#[test]
fn test_prediction_json_contract() {
    let probs = probabilities(&[("melanoma", 0.3), ("BCC", 0.7)]);
    let prediction = Prediction::from_probabilities(probs, false, true);
    let value: serde_json::Value =
        serde_json::from_str(&PredictionResponse::Success(prediction).to_json()).unwrap();

    assert_eq!(value["prediction"], "BCC");
    assert_eq!(value["metadata_used"], false);
    assert_eq!(value["metadata_supported"], true);

    let melanoma = value["probabilities"]["melanoma"].as_f64().unwrap();
    let non_melanoma = value["probabilities"]["non_melanoma"].as_f64().unwrap();
    assert!((melanoma + non_melanoma - 1.0).abs() < 1e-6);

    let all = value["all_probabilities"].as_object().unwrap();
    for label in CLASS_NAMES {
        assert!(all.contains_key(label), "missing {}", label);
    }
    let mel = all[CLASS_NAMES[MELANOMA_INDEX]].as_f64().unwrap();
    assert!((mel - 0.3).abs() < 1e-6);
}

#[test]
fn test_all_probabilities_keep_label_order() {
    let json = PredictionResponse::Success(Prediction::from_probabilities(
        probabilities(&[("melanoma", 0.6)]),
        true,
        true,
    ))
    .to_json();
    let start = json.find("\"all_probabilities\"").unwrap();
    let all = &json[start..];

    let mut last = 0;
    for label in CLASS_NAMES {
        let pos = all.find(&format!("\"{}\":", label)).unwrap();
        assert!(pos >= last, "{} out of order", label);
        last = pos;
    }
}
