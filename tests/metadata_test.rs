use skinsight::{build_features, PatientMetadata, Sex, ANATOMIC_SITES, META_FEATURES};

fn features_for(json: &str) -> [f32; META_FEATURES] {
    let metadata = PatientMetadata::from_json_str(json).expect("valid metadata");
    build_features(metadata.as_ref())
}

#[test]
fn test_vector_length_and_single_site_slot() {
    let samples = [
        r#"{}"#,
        r#"{"sex": "male"}"#,
        r#"{"age_approx": 35, "anatom_site_general": "head/neck"}"#,
        r#"{"sex": "Female", "age_approx": "70", "anatom_site_general": "PALMS/SOLES"}"#,
        r#"{"anatom_site_general": "left ear"}"#,
        r#"{"anatom_site_general": null, "age_approx": true}"#,
        r#"null"#,
    ];

    for sample in samples {
        let features = features_for(sample);
        assert_eq!(features.len(), 4 + ANATOMIC_SITES.len(), "{}", sample);
        let set: Vec<usize> = features[4..]
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 1.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(set.len(), 1, "exactly one site slot for {}", sample);
        assert_eq!(features[4..].iter().sum::<f32>(), 1.0);
    }
}

#[test]
fn test_every_known_site_maps_to_its_own_slot() {
    for (i, site) in ANATOMIC_SITES.iter().enumerate() {
        let features = features_for(&format!(r#"{{"anatom_site_general": "{}"}}"#, site));
        assert_eq!(features[4 + i], 1.0, "site {}", site);
    }
}

#[test]
fn test_age_is_monotonic_and_clamped() {
    let ages = [0, 10, 30, 45, 60, 89, 90, 120, 180];
    let normalized: Vec<f32> = ages
        .iter()
        .map(|age| features_for(&format!(r#"{{"age_approx": {}}}"#, age))[1])
        .collect();

    assert_eq!(normalized[0], 0.0);
    assert_eq!(normalized[6], 1.0);
    assert_eq!(*normalized.last().unwrap(), 1.0);
    assert!(normalized.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_sex_codes() {
    assert_eq!(features_for(r#"{"sex": "Male"}"#)[0], 1.0);
    assert_eq!(features_for(r#"{"sex": "female"}"#)[0], 0.0);
    assert_eq!(features_for(r#"{"sex": "unknown"}"#)[0], -1.0);
    assert_eq!(features_for(r#"{}"#)[0], -1.0);
    assert_eq!(Sex::default(), Sex::Unknown);
}

#[test]
fn test_constant_slots() {
    let features = features_for(r#"{"sex": "male", "age_approx": 50}"#);
    assert_eq!(features[2], 1.0);
    assert_eq!(features[3], 0.0);
}

#[test]
fn test_rejects_non_object_json() {
    assert!(PatientMetadata::from_json_str("42").is_err());
    assert!(PatientMetadata::from_json_str("\"male\"").is_err());
    assert!(PatientMetadata::from_json_str("{\"sex\": ").is_err());
}
