//! Configuration file loading through the public API

use std::fs;
use std::path::PathBuf;

use gazecast::Config;

#[test]
fn test_config_file_overrides_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("gazecast.toml");
    fs::write(
        &path,
        r#"
        [models]
        gaze = "/opt/models/gaze.xml"

        [inference]
        enable_reshape = true
        cpu_threads = 4

        [gaze]
        roll_align = false

        [display]
        head_pose = false
        "#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();

    assert_eq!(config.models.gaze, PathBuf::from("/opt/models/gaze.xml"));
    assert_eq!(
        config.models.face_detection,
        PathBuf::from("models/face-detection-retail-0004.xml")
    );
    assert!(config.inference.enable_reshape);
    assert_eq!(config.inference.cpu_threads, Some(4));
    assert_eq!(config.inference.detection_threshold, 0.5);
    assert!(!config.gaze.roll_align);

    let marks = config.display.marker_options();
    assert!(!marks.head_pose);
    assert!(marks.gaze);
}

#[test]
fn test_malformed_config_is_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("gazecast.toml");
    fs::write(&path, "[inference]\ndetection_threshold = \"high\"\n").unwrap();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_empty_device_pairs_are_reported() {
    let mut config = Config::default();
    config.devices.head_pose.clear();

    let pairs = config.device_model_pairs();
    assert_eq!(pairs.iter().filter(|(device, _)| device.is_empty()).count(), 1);
}
