use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use distancing_kernel::{DistancingConfig, ModelKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DISTANCING_CONFIG",
        "DISTANCING_SOURCE",
        "DISTANCING_BACKEND",
        "DISTANCING_MODEL",
        "DISTANCING_THROTTLE_INTERVAL",
        "DISTANCING_SEED",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
[source]
path = "videos/plaza.mp4"

[detector]
backend = "Tract"
model = "yolov3-tiny"
models_dir = "/srv/models"
confidence_threshold = 0.5

[engine]
group_ratio = 1.6
max_height_diff = 40
seed = 7

[throttle]
interval = 2
"#,
    );

    std::env::set_var("DISTANCING_CONFIG", file.path());
    std::env::set_var("DISTANCING_SOURCE", "videos/station.mp4");
    std::env::set_var("DISTANCING_SEED", "99");

    let cfg = DistancingConfig::load().expect("load config");
    assert_eq!(cfg.source.path, "videos/station.mp4");
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.detector.model, ModelKind::YoloV3Tiny);
    assert_eq!(
        cfg.detector.model_path(),
        PathBuf::from("/srv/models/yolov3-tiny.onnx")
    );
    assert_eq!(cfg.detector.confidence_threshold, 0.5);
    assert_eq!(cfg.detector.nms_threshold, 0.3);
    assert_eq!(cfg.engine.group_ratio, 1.6);
    assert_eq!(cfg.engine.max_height_diff, 40);
    assert_eq!(cfg.throttle_interval, 2);
    assert_eq!(cfg.palette_seed, Some(99));

    clear_env();
}

#[test]
fn env_alone_overrides_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DISTANCING_BACKEND", "stub");
    std::env::set_var("DISTANCING_MODEL", "enet-coco");
    std::env::set_var("DISTANCING_THROTTLE_INTERVAL", "1");

    let cfg = DistancingConfig::load().expect("load config");
    assert_eq!(cfg.source.path, "stub://camera");
    assert_eq!(cfg.detector.model, ModelKind::EnetCoco);
    assert_eq!(cfg.throttle_interval, 1);
    assert!(cfg.palette_seed.is_none());

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DISTANCING_THROTTLE_INTERVAL", "0");
    assert!(DistancingConfig::load().is_err());
    std::env::set_var("DISTANCING_THROTTLE_INTERVAL", "often");
    assert!(DistancingConfig::load().is_err());
    clear_env();

    std::env::set_var("DISTANCING_SEED", "-1");
    assert!(DistancingConfig::load().is_err());

    clear_env();
}

#[test]
fn explicit_path_replaces_env_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let env_file = write_config("[throttle]\ninterval = 8\n");
    let explicit = write_config("[throttle]\ninterval = 3\n");
    std::env::set_var("DISTANCING_CONFIG", env_file.path());

    let cfg = DistancingConfig::load_from(Some(explicit.path())).expect("load config");
    assert_eq!(cfg.throttle_interval, 3);

    clear_env();
}

#[test]
fn reports_unreadable_and_malformed_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let missing = PathBuf::from("/nonexistent/distancing.toml");
    let err = DistancingConfig::load_from(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    let malformed = write_config("[engine\ngroup_ratio = 1.4\n");
    let err = DistancingConfig::load_from(Some(malformed.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
