use std::io::Write;
use std::time::Duration;

use frame3d::config::{Configuration, PowerPreference};
use frame3d::events::Rotation;

#[test]
fn parse_kebab_case_config() {
    let yaml = r##"
images:
  - "https://example.com/a.jpg"
  - "/srv/photos/b.png"
renderer:
  camera-fov-deg: 30
  fade-duration: 300ms
  power-preference: high-performance
  background: "#ffffff"
loader:
  max-concurrent-decodes: 4
host:
  dwell: 8s
  shuffle: false
  inspect-rest-rotation: { x: 0.1, y: -0.2 }
"##;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.images.len(), 2);
    assert!((cfg.renderer.camera_fov_deg - 30.0).abs() < f32::EPSILON);
    assert_eq!(cfg.renderer.fade_duration, Duration::from_millis(300));
    assert_eq!(
        cfg.renderer.power_preference,
        PowerPreference::HighPerformance
    );
    assert_eq!(cfg.loader.max_concurrent_decodes, 4);
    assert_eq!(cfg.host.dwell, Some(Duration::from_secs(8)));
    assert!(!cfg.host.shuffle);
    assert_eq!(cfg.host.inspect_rest_rotation, Rotation::new(0.1, -0.2));
    cfg.validated().unwrap();
}

#[test]
fn defaults_fill_missing_sections() {
    let cfg: Configuration = serde_yaml::from_str("images: [a.jpg]").unwrap();
    let renderer = &cfg.renderer;
    assert!((renderer.camera_fov_deg - 24.0).abs() < f32::EPSILON);
    assert!((renderer.fit_margin - 1.35).abs() < f32::EPSILON);
    assert_eq!(renderer.fade_duration, Duration::from_millis(520));
    assert!((renderer.rotation_damping - 0.12).abs() < f32::EPSILON);
    assert_eq!(renderer.max_anisotropy, 3);
    assert_eq!(renderer.power_preference, PowerPreference::LowPower);
    assert_eq!(renderer.background, "#fdf9f2");
    assert!(!renderer.reduced_motion);
    assert_eq!(renderer.restore_retry, Duration::from_secs(1));

    assert_eq!(cfg.loader.max_concurrent_decodes, 2);
    assert!(cfg.loader.user_agent.starts_with("frame3d/"));

    assert_eq!(cfg.host.dwell, None);
    assert_eq!(cfg.host.direction_reset, Duration::from_millis(620));
    assert_eq!(cfg.host.retry_after, Duration::from_secs(4));
    assert_eq!(cfg.host.max_retries, 2);
    assert!(cfg.host.shuffle);
    assert_eq!(cfg.host.inspect_rest_rotation, Rotation::new(0.06, -0.18));
    cfg.validated().unwrap();
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
images: [a.jpg]
renderer:
  camera-fov: 30
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn empty_feed_is_invalid() {
    let cfg: Configuration = serde_yaml::from_str("images: []").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("images"));

    let cfg: Configuration = serde_yaml::from_str("images: ['  ']").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn out_of_range_renderer_values_are_invalid() {
    for section in [
        "camera-fov-deg: 0",
        "camera-fov-deg: 180",
        "fit-margin: 0",
        "rotation-damping: 0",
        "rotation-damping: 1.5",
        "max-anisotropy: 0",
        "max-anisotropy: 17",
        "fade-duration: 0s",
        "restore-retry: 0s",
        "background: sand",
    ] {
        let yaml = format!("images: [a.jpg]\nrenderer:\n  {section}\n");
        let cfg: Configuration = serde_yaml::from_str(&yaml).unwrap();
        assert!(cfg.validated().is_err(), "{section} should be rejected");
    }
}

#[test]
fn zero_host_durations_are_invalid() {
    for section in ["dwell: 0s", "direction-reset: 0s", "retry-after: 0s"] {
        let yaml = format!("images: [a.jpg]\nhost:\n  {section}\n");
        let cfg: Configuration = serde_yaml::from_str(&yaml).unwrap();
        assert!(cfg.validated().is_err(), "{section} should be rejected");
    }
    let cfg: Configuration =
        serde_yaml::from_str("images: [a.jpg]\nloader:\n  max-concurrent-decodes: 0\n").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn loads_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "images:\n  - file:///tmp/a.jpg\nhost:\n  shuffle-seed: 7\n"
    )
    .unwrap();
    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.images, vec!["file:///tmp/a.jpg".to_string()]);
    assert_eq!(cfg.host.shuffle_seed, Some(7));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Configuration::from_yaml_file(dir.path().join("absent.yaml")).is_err());
}
