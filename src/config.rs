//! Daemon configuration.
//!
//! Defaults are compiled in; a JSON config file overrides them field by
//! field, and a small set of environment variables overrides the file. The
//! config file path itself comes from `PERCEPT_CONFIG`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::detect::{
    DetectorConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE, DEFAULT_IOU_THRESHOLD,
};
use crate::motion::MotionProfile;

pub const ENV_CONFIG_PATH: &str = "PERCEPT_CONFIG";
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Step table: named groups, each mapping option names to a step magnitude.
///
/// `BTreeMap` keeps option cycling order stable across loads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepTable(pub BTreeMap<String, BTreeMap<String, f64>>);

impl StepTable {
    pub fn lookup(&self, group: &str, option: &str) -> Option<f64> {
        self.0.get(group).and_then(|options| options.get(option)).copied()
    }

    /// Option names within a group, in stable order.
    pub fn options(&self, group: &str) -> Vec<String> {
        self.0
            .get(group)
            .map(|options| options.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Seed a starter table when none was configured.
    pub fn ensure_default(&mut self) {
        if !self.is_empty() {
            return;
        }
        for (group, steps) in [
            ("baseline", [("low", 2.0), ("medium", 4.0), ("high", 6.0)]),
            ("extended", [("low", 3.0), ("medium", 6.0), ("high", 9.0)]),
        ] {
            self.0.insert(
                group.to_string(),
                steps
                    .into_iter()
                    .map(|(name, step)| (name.to_string(), step))
                    .collect(),
            );
        }
    }
}

/// Selection slot: a (group, option) pair into the step table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSelection {
    pub group: String,
    pub option: String,
}

impl SlotSelection {
    pub fn new(group: &str, option: &str) -> Self {
        Self {
            group: group.to_string(),
            option: option.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PerceptConfig {
    pub capture: CaptureConfig,
    /// Run frames through the detector; disabled, the pipeline is capture
    /// and display only.
    pub detect_enabled: bool,
    /// Detection model file; absent means the stub backend.
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub class_names: Vec<String>,
    pub motion: MotionProfile,
    pub steps: StepTable,
    pub slots: [SlotSelection; 2],
    /// Hardware relay library; absent means software injection only.
    pub relay_library: Option<String>,
    /// Directory for periodic PNG snapshots of the displayed frame.
    pub snapshot_dir: Option<PathBuf>,
    /// Capture loop pacing interval.
    pub frame_interval_ms: u64,
}

impl Default for PerceptConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            detect_enabled: true,
            model_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            class_names: vec!["person".to_string(), "head".to_string()],
            motion: MotionProfile::default(),
            steps: StepTable::default(),
            slots: [
                SlotSelection::new("baseline", "medium"),
                SlotSelection::new("extended", "medium"),
            ],
            relay_library: None,
            snapshot_dir: None,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

/// On-disk layout: every field optional so partial files override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    source: Option<String>,
    capture_width: Option<u32>,
    capture_height: Option<u32>,
    capture_timeout_ms: Option<u32>,
    detect: Option<bool>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    class_names: Option<Vec<String>>,
    tick_interval_ms: Option<u64>,
    vertical_amplitude: Option<f64>,
    horizontal_amplitude: Option<f64>,
    vertical_hz: Option<f64>,
    horizontal_hz: Option<f64>,
    jitter: Option<f64>,
    steps: Option<StepTable>,
    slot1: Option<SlotSelection>,
    slot2: Option<SlotSelection>,
    relay_library: Option<String>,
    snapshot_dir: Option<PathBuf>,
    frame_interval_ms: Option<u64>,
}

impl PerceptConfig {
    /// Load configuration: defaults, then the config file if present, then
    /// environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            config.apply_file(Path::new(&path))?;
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let Some(source) = file.source {
            self.capture.source = source;
        }
        if let Some(width) = file.capture_width {
            self.capture.width = width;
        }
        if let Some(height) = file.capture_height {
            self.capture.height = height;
        }
        if let Some(timeout) = file.capture_timeout_ms {
            self.capture.timeout_ms = timeout;
        }
        if let Some(enabled) = file.detect {
            self.detect_enabled = enabled;
        }
        if file.model_path.is_some() {
            self.model_path = file.model_path;
        }
        if let Some(size) = file.input_size {
            self.input_size = size;
        }
        if let Some(threshold) = file.confidence_threshold {
            self.confidence_threshold = threshold;
        }
        if let Some(threshold) = file.iou_threshold {
            self.iou_threshold = threshold;
        }
        if let Some(names) = file.class_names {
            self.class_names = names;
        }
        if let Some(ms) = file.tick_interval_ms {
            self.motion.tick_interval = std::time::Duration::from_millis(ms);
        }
        if let Some(amp) = file.vertical_amplitude {
            self.motion.vertical_amplitude = amp;
        }
        if let Some(amp) = file.horizontal_amplitude {
            self.motion.horizontal_amplitude = amp;
        }
        if let Some(hz) = file.vertical_hz {
            self.motion.vertical_hz = hz;
        }
        if let Some(hz) = file.horizontal_hz {
            self.motion.horizontal_hz = hz;
        }
        if let Some(jitter) = file.jitter {
            self.motion.jitter = jitter;
        }
        if let Some(steps) = file.steps {
            self.steps = steps;
        }
        if let Some(slot) = file.slot1 {
            self.slots[0] = slot;
        }
        if let Some(slot) = file.slot2 {
            self.slots[1] = slot;
        }
        if file.relay_library.is_some() {
            self.relay_library = file.relay_library;
        }
        if file.snapshot_dir.is_some() {
            self.snapshot_dir = file.snapshot_dir;
        }
        if let Some(ms) = file.frame_interval_ms {
            self.frame_interval_ms = ms;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("PERCEPT_SOURCE") {
            self.capture.source = source;
        }
        if let Ok(path) = std::env::var("PERCEPT_MODEL") {
            self.model_path = Some(PathBuf::from(path));
        }
        if let Ok(value) = std::env::var("PERCEPT_CONFIDENCE") {
            self.confidence_threshold = value
                .parse()
                .context("PERCEPT_CONFIDENCE must be a float")?;
        }
        if let Ok(path) = std::env::var("PERCEPT_SNAPSHOT_DIR") {
            self.snapshot_dir = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("PERCEPT_RELAY_LIBRARY") {
            self.relay_library = Some(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture region must be non-empty"));
        }
        if self.input_size == 0 {
            return Err(anyhow!("input_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(anyhow!("iou_threshold must be within [0, 1]"));
        }
        if self.class_names.is_empty() {
            return Err(anyhow!("class_names must not be empty"));
        }
        if self.motion.tick_interval.is_zero() {
            return Err(anyhow!("tick_interval_ms must be positive"));
        }
        if self.motion.jitter < 0.0 {
            return Err(anyhow!("jitter must not be negative"));
        }
        if self.frame_interval_ms == 0 {
            return Err(anyhow!("frame_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            class_names: self.class_names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        default_source_uri, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_TIMEOUT_MS,
        DEFAULT_CAPTURE_WIDTH,
    };
    use crate::motion::{
        DEFAULT_HORIZONTAL_AMPLITUDE, DEFAULT_HORIZONTAL_HZ, DEFAULT_JITTER, DEFAULT_VERTICAL_HZ,
        DEFAULT_TICK_INTERVAL_MS, DEFAULT_VERTICAL_AMPLITUDE,
    };

    #[test]
    fn defaults_validate() {
        let config = PerceptConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capture.source, default_source_uri());
        assert_eq!(config.capture.width, DEFAULT_CAPTURE_WIDTH);
        assert_eq!(config.capture.height, DEFAULT_CAPTURE_HEIGHT);
        assert_eq!(config.capture.timeout_ms, DEFAULT_CAPTURE_TIMEOUT_MS);
        assert_eq!(config.motion.vertical_hz, DEFAULT_VERTICAL_HZ);
        assert_eq!(config.motion.horizontal_hz, DEFAULT_HORIZONTAL_HZ);
        assert_eq!(config.motion.vertical_amplitude, DEFAULT_VERTICAL_AMPLITUDE);
        assert_eq!(
            config.motion.horizontal_amplitude,
            DEFAULT_HORIZONTAL_AMPLITUDE
        );
        assert_eq!(config.motion.jitter, DEFAULT_JITTER);
        assert_eq!(
            config.motion.tick_interval.as_millis() as u64,
            DEFAULT_TICK_INTERVAL_MS
        );
    }

    #[test]
    fn step_table_lookup_and_order() {
        let mut table = StepTable::default();
        table.ensure_default();
        assert_eq!(table.lookup("baseline", "medium"), Some(4.0));
        assert_eq!(table.lookup("baseline", "missing"), None);
        assert_eq!(table.lookup("missing", "low"), None);
        assert_eq!(table.options("baseline"), vec!["high", "low", "medium"]);
    }

    #[test]
    fn ensure_default_keeps_existing_table() {
        let mut table = StepTable::default();
        table
            .0
            .entry("custom".to_string())
            .or_default()
            .insert("only".to_string(), 1.5);
        table.ensure_default();
        assert_eq!(table.0.len(), 1);
        assert_eq!(table.lookup("custom", "only"), Some(1.5));
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("percept.json");
        std::fs::write(
            &path,
            r#"{
                "source": "stub://bench",
                "confidence_threshold": 0.5,
                "steps": {"baseline": {"low": 1.0}},
                "slot1": {"group": "baseline", "option": "low"}
            }"#,
        )
        .unwrap();

        let mut config = PerceptConfig::default();
        config.apply_file(&path).unwrap();
        config.validate().unwrap();

        assert_eq!(config.capture.source, "stub://bench");
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.steps.lookup("baseline", "low"), Some(1.0));
        assert_eq!(config.slots[0], SlotSelection::new("baseline", "low"));
        // Untouched fields keep their defaults.
        assert_eq!(config.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(config.iou_threshold, DEFAULT_IOU_THRESHOLD);
        assert_eq!(config.confidence_threshold, 0.5);
    }

    #[test]
    fn unknown_file_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("percept.json");
        std::fs::write(&path, r#"{"sourec": "stub://typo"}"#).unwrap();
        let mut config = PerceptConfig::default();
        assert!(config.apply_file(&path).is_err());
    }

    #[test]
    fn out_of_range_thresholds_fail_validation() {
        let mut config = PerceptConfig::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PerceptConfig::default();
        config.class_names.clear();
        assert!(config.validate().is_err());
    }
}
