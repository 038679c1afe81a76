use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use bear_watch::config::WatchConfig;
use bear_watch::BackendSelection;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BEARWATCH_CONFIG",
        "BEARWATCH_SERVICE_URL",
        "BEARWATCH_BACKEND",
        "BEARWATCH_SOURCE_URL",
        "BEARWATCH_MODEL_PATH",
        "BEARWATCH_REMOTE_PACING_MS",
        "BEARWATCH_REDRAW_FPS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "service_url": "http://detector.lan:9000/api",
        "backend": "remote",
        "jpeg_quality": 70,
        "source": {
            "url": "http://camera.lan/snapshot.jpg",
            "width": 800,
            "height": 600
        },
        "model": {
            "path": "models/ssd.onnx",
            "confidence_threshold": 0.6
        },
        "timing": {
            "redraw_fps": 20,
            "remote_pacing_ms": 400,
            "reprobe_secs": 5
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("BEARWATCH_CONFIG", file.path());
    std::env::set_var("BEARWATCH_BACKEND", "local");
    std::env::set_var("BEARWATCH_REMOTE_PACING_MS", "300");

    let cfg = WatchConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.service_url.as_str(), "http://detector.lan:9000/api");
    assert_eq!(cfg.backend, BackendSelection::LocalModel);
    assert_eq!(cfg.jpeg_quality, 70);
    assert_eq!(cfg.source.url, "http://camera.lan/snapshot.jpg");
    assert_eq!((cfg.source.width, cfg.source.height), (800, 600));
    assert_eq!(
        cfg.model.path.as_deref(),
        Some(std::path::Path::new("models/ssd.onnx"))
    );
    assert_eq!(cfg.model.input_width, 300);
    assert!((cfg.model.confidence_threshold - 0.6).abs() < f32::EPSILON);

    let settings = cfg.loop_settings();
    assert_eq!(settings.frame_interval, Duration::from_millis(50));
    assert_eq!(settings.remote_pacing, Duration::from_millis(300));
    assert_eq!(settings.reprobe_interval, Duration::from_secs(5));

    let remote = cfg.remote_config();
    assert_eq!(remote.jpeg_quality, 70);
    assert_eq!(remote.timeout, Duration::from_secs(10));
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("BEARWATCH_SERVICE_URL", "https://vision.example.org/");

    let cfg = WatchConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.service_url.as_str(), "https://vision.example.org/");
    assert_eq!(cfg.backend, BackendSelection::LocalModel);
    assert_eq!(cfg.source.url, "stub://front_camera");
    assert!(cfg.model.path.is_none());
    assert_eq!(cfg.timing.remote_pacing, Duration::from_millis(250));
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BEARWATCH_REDRAW_FPS", "0");
    assert!(WatchConfig::load().is_err());
    clear_env();

    std::env::set_var("BEARWATCH_REMOTE_PACING_MS", "soon");
    assert!(WatchConfig::load().is_err());
    clear_env();

    std::env::set_var("BEARWATCH_BACKEND", "tpu");
    let err = WatchConfig::load().unwrap_err();
    assert!(err.to_string().contains("unknown backend"));
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("BEARWATCH_CONFIG", file.path());
    assert!(WatchConfig::load().is_err());
    clear_env();
}
