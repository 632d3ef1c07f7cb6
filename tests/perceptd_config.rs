//! Configuration loading through files and the environment.

use std::sync::Mutex;

use percept::config::{PerceptConfig, SlotSelection, ENV_CONFIG_PATH};

// Environment mutation is process-global; serialize the tests that touch it.
static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvGuard {
    keys: Vec<&'static str>,
}

impl EnvGuard {
    fn set(pairs: &[(&'static str, &str)]) -> Self {
        for (key, value) in pairs {
            std::env::set_var(key, value);
        }
        Self {
            keys: pairs.iter().map(|(key, _)| *key).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn load_without_file_or_env_yields_defaults() {
    let _lock = ENV_LOCK.lock().unwrap();
    let config = PerceptConfig::load().unwrap();
    assert_eq!(config.capture.width, 640);
    assert_eq!(config.capture.height, 640);
    assert_eq!(config.confidence_threshold, 0.25);
    assert!(config.model_path.is_none());
}

#[test]
fn config_file_from_env_is_applied() {
    let _lock = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("percept.json");
    std::fs::write(
        &path,
        r#"{
            "source": "stub://bench",
            "capture_width": 320,
            "capture_height": 240,
            "steps": {"baseline": {"low": 1.25}},
            "slot1": {"group": "baseline", "option": "low"},
            "frame_interval_ms": 33
        }"#,
    )
    .unwrap();

    let _env = EnvGuard::set(&[(ENV_CONFIG_PATH, path.to_str().unwrap())]);
    let config = PerceptConfig::load().unwrap();
    assert_eq!(config.capture.source, "stub://bench");
    assert_eq!(config.capture.width, 320);
    assert_eq!(config.capture.height, 240);
    assert_eq!(config.steps.lookup("baseline", "low"), Some(1.25));
    assert_eq!(config.slots[0], SlotSelection::new("baseline", "low"));
    assert_eq!(config.frame_interval_ms, 33);
}

#[test]
fn env_overrides_beat_the_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("percept.json");
    std::fs::write(&path, r#"{"source": "stub://from-file"}"#).unwrap();

    let _env = EnvGuard::set(&[
        (ENV_CONFIG_PATH, path.to_str().unwrap()),
        ("PERCEPT_SOURCE", "stub://from-env"),
        ("PERCEPT_CONFIDENCE", "0.4"),
    ]);
    let config = PerceptConfig::load().unwrap();
    assert_eq!(config.capture.source, "stub://from-env");
    assert_eq!(config.confidence_threshold, 0.4);
}

#[test]
fn malformed_env_value_is_an_error() {
    let _lock = ENV_LOCK.lock().unwrap();
    let _env = EnvGuard::set(&[("PERCEPT_CONFIDENCE", "not-a-float")]);
    assert!(PerceptConfig::load().is_err());
}

#[test]
fn missing_config_file_is_an_error() {
    let _lock = ENV_LOCK.lock().unwrap();
    let _env = EnvGuard::set(&[(ENV_CONFIG_PATH, "/nonexistent/percept.json")]);
    assert!(PerceptConfig::load().is_err());
}

#[test]
fn invalid_threshold_in_file_fails_validation() {
    let _lock = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("percept.json");
    std::fs::write(&path, r#"{"confidence_threshold": 2.0}"#).unwrap();

    let _env = EnvGuard::set(&[(ENV_CONFIG_PATH, path.to_str().unwrap())]);
    assert!(PerceptConfig::load().is_err());
}
