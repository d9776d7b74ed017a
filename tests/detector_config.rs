use std::sync::Mutex;

use tempfile::NamedTempFile;

use brickseek::DetectorConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BRICKSEEK_CONFIG",
        "BRICKSEEK_EDGE_THRESHOLD",
        "BRICKSEEK_COLOR_THRESHOLD",
        "BRICKSEEK_CONFIDENCE_THRESHOLD",
        "BRICKSEEK_NMS_MAX_RESULTS",
        "BRICKSEEK_WINDOW_CAPACITY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DetectorConfig::load().expect("load config");
    assert_eq!(cfg.shape.edge_threshold, 50.0);
    assert_eq!(cfg.color.color_threshold, 30);
    assert_eq!(cfg.nms.max_results, 10);
    assert_eq!(cfg.stabilizer.window_capacity, 10);
    assert_eq!(cfg.stabilizer.quorum_frames, 3);
    assert_eq!(cfg.neural.confidence_threshold, 0.5);
}

#[test]
fn partial_file_fills_remaining_fields_with_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "shape": {
            "edge_threshold": 40.0,
            "min_area": 500.0
        },
        "nms": {
            "iou_threshold": 0.5
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("BRICKSEEK_CONFIG", file.path());

    let cfg = DetectorConfig::load().expect("load config");
    assert_eq!(cfg.shape.edge_threshold, 40.0);
    assert_eq!(cfg.shape.min_area, 500.0);
    assert_eq!(cfg.shape.max_area, 100_000.0);
    assert_eq!(cfg.nms.iou_threshold, 0.5);
    assert_eq!(cfg.nms.max_results, 10);
    assert_eq!(cfg.color.scan_cap, 20);

    clear_env();
}

#[test]
fn env_overrides_beat_file_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "shape": { "edge_threshold": 40.0 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("BRICKSEEK_CONFIG", file.path());
    std::env::set_var("BRICKSEEK_EDGE_THRESHOLD", "75");
    std::env::set_var("BRICKSEEK_CONFIDENCE_THRESHOLD", "0.8");

    let cfg = DetectorConfig::load().expect("load config");
    assert_eq!(cfg.shape.edge_threshold, 75.0);
    assert_eq!(cfg.neural.confidence_threshold, 0.8);

    clear_env();
}

#[test]
fn invalid_bounds_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "stabilizer": { "quorum_frames": 5, "quorum_min": 6 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("BRICKSEEK_CONFIG", file.path());

    assert!(DetectorConfig::load().is_err());

    clear_env();
}

#[test]
fn out_of_range_confidence_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BRICKSEEK_CONFIDENCE_THRESHOLD", "1.5");
    assert!(DetectorConfig::load().is_err());

    clear_env();
}
