use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use roi_congestion::config::CongestionConfig;
use roi_congestion::{ThresholdConfig, VehicleClass};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ROI_CONFIG",
        "ROI_REGIONS_PATH",
        "ROI_FRAME_SKIP",
        "ROI_CAR_THRESHOLD",
        "ROI_TRUCK_THRESHOLD",
        "ROI_BUS_THRESHOLD",
        "ROI_OVERALL_THRESHOLD",
        "ROI_OUTPUT_DIR",
        "ROI_FONT_PATH",
        "ROI_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "regions_path": "junction_regions.json",
        "frame_skip": 2,
        "thresholds": { "car": 8, "truck": 4, "bus": 1, "overall": 12 },
        "annotation": { "region_alpha": 0.3, "font_path": "/fonts/panel.ttf" },
        "output": { "dir": "junction_out" },
        "detector": { "model_path": "models/yolo.onnx", "input_size": 320, "confidence": 0.4 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("ROI_CONFIG", file.path());
    std::env::set_var("ROI_TRUCK_THRESHOLD", "6");
    std::env::set_var("ROI_OVERALL_THRESHOLD", "20");
    std::env::set_var("ROI_OUTPUT_DIR", "override_out");

    let cfg = CongestionConfig::load().expect("load config");

    assert_eq!(cfg.regions_path.to_str(), Some("junction_regions.json"));
    assert_eq!(cfg.frame_skip, 2);
    assert_eq!(cfg.thresholds, ThresholdConfig::new(8, 6, 1, 20));
    assert_eq!(cfg.style.region_alpha, 0.3);
    assert_eq!(cfg.style.panel_alpha, 0.4);
    assert_eq!(cfg.font_path.as_deref().and_then(|p| p.to_str()), Some("/fonts/panel.ttf"));
    assert_eq!(cfg.output_dir.to_str(), Some("override_out"));
    assert_eq!(cfg.detector.model_path.to_str(), Some("models/yolo.onnx"));
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.pipeline_settings().frame_skip, 2);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
frame_skip = 5

[thresholds]
car = 3
motorcycle = 2
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = CongestionConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.frame_skip, 5);
    assert_eq!(cfg.thresholds.threshold(VehicleClass::Car), Some(3));
    assert_eq!(cfg.thresholds.threshold(VehicleClass::Truck), Some(3));
    assert_eq!(cfg.thresholds.threshold(VehicleClass::Motorcycle), Some(2));
    assert_eq!(cfg.thresholds.overall(), 10);

    clear_env();
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROI_CAR_THRESHOLD", "-2");
    let err = CongestionConfig::load().unwrap_err();
    assert!(err.to_string().contains("ROI_CAR_THRESHOLD"));
    clear_env();

    std::env::set_var("ROI_FRAME_SKIP", "0");
    assert!(CongestionConfig::load().is_err());
    clear_env();

    std::env::set_var("ROI_BUS_THRESHOLD", "many");
    assert!(CongestionConfig::load().is_err());
    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CongestionConfig::load().expect("load defaults");
    assert_eq!(cfg.regions_path.to_str(), Some("regions.json"));
    assert_eq!(cfg.frame_skip, 4);
    assert_eq!(cfg.thresholds, ThresholdConfig::default());
    assert_eq!(cfg.output_dir.to_str(), Some("output_result"));
    assert!(cfg.font_path.is_none());
}
