//! JSON configuration and report helpers for cliff detection.

use crate::{
    CliffDetectError, CliffDetection, CliffDetector, CliffDetectorParams, CliffParamsError,
    CliffPoint, FlaggedBlock,
};
use depth_cliff_core::{CameraInfo, FrameHeader};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum CliffIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Configuration for a one-shot detection run on a depth PNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliffDetectConfig {
    pub depth_path: String,
    pub camera: CameraInfo,
    #[serde(default)]
    pub params: CliffDetectorParams,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Where to write the marked depth frame when `publish_depth_enable` is on.
    #[serde(default)]
    pub annotated_path: Option<String>,
}

impl CliffDetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CliffIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CliffIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cliff_detect_report.json"))
    }

    pub fn build_detector(&self) -> Result<CliffDetector, CliffParamsError> {
        CliffDetector::new(self.params.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliffDetectReport {
    pub depth_path: String,
    pub config_path: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub header: FrameHeader,
    #[serde(default)]
    pub flagged_blocks: Vec<FlaggedBlock>,
    #[serde(default)]
    pub points: Vec<CliffPoint>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CliffDetectReport {
    /// Build an empty report for a frame of `width x height`.
    pub fn new(cfg: &CliffDetectConfig, config_path: &Path, width: usize, height: usize) -> Self {
        Self {
            depth_path: cfg.depth_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            width,
            height,
            header: cfg.camera.header.clone(),
            flagged_blocks: Vec::new(),
            points: Vec::new(),
            error: None,
        }
    }

    /// Populate report fields from a successful detection.
    pub fn set_detection<T>(&mut self, res: &CliffDetection<T>) {
        self.header = res.header.clone();
        self.flagged_blocks = res.blocks.clone();
        self.points = res.points.clone();
        self.error = None;
    }

    /// Record a detection error.
    pub fn set_error(&mut self, err: &CliffDetectError) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CliffIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CliffIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_cliff_core::DepthImage;

    fn config() -> CliffDetectConfig {
        CliffDetectConfig {
            depth_path: "frame.png".into(),
            camera: CameraInfo::pinhole(64, 48, 60.0, 60.0, 31.5, 23.5),
            params: CliffDetectorParams::default(),
            output_path: None,
            annotated_path: None,
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: CliffDetectConfig = serde_json::from_str(
            r#"{
                "depth_path": "depth.png",
                "camera": {"width": 64, "height": 48, "fx": 60.0, "fy": 60.0, "cx": 31.5, "cy": 23.5}
            }"#,
        )
        .expect("parse");
        assert_eq!(cfg.params, CliffDetectorParams::default());
        assert_eq!(cfg.output_path(), PathBuf::from("cliff_detect_report.json"));
        assert!(cfg.build_detector().is_ok());
    }

    #[test]
    fn invalid_params_fail_to_build() {
        let mut cfg = config();
        cfg.params.range_min = 10.0;
        assert!(matches!(
            cfg.build_detector(),
            Err(CliffParamsError::InvalidRange { .. })
        ));
    }

    #[test]
    fn config_and_report_survive_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.json");
        let cfg = config();
        cfg.write_json(&cfg_path).expect("write config");
        let loaded = CliffDetectConfig::load_json(&cfg_path).expect("load config");
        assert_eq!(loaded.camera, cfg.camera);

        let mut detector = cfg.build_detector().expect("detector");
        detector.set_range(0.05, 5.0).expect("range");
        detector.set_used_depth_height(16);
        let frame = DepthImage::filled(64, 48, 3000u16).expect("frame");
        let res = detector.detect(&frame.view(), &cfg.camera).expect("detect");
        assert!(!res.is_empty());

        let mut report = CliffDetectReport::new(&cfg, &cfg_path, 64, 48);
        report.set_detection(&res);
        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).expect("write report");

        let back = CliffDetectReport::load_json(&report_path).expect("load report");
        assert_eq!(back.flagged_blocks, res.blocks);
        assert_eq!(back.points.len(), res.points.len());
        assert!(back.error.is_none());
    }

    #[test]
    fn error_is_recorded_as_text() {
        let cfg = config();
        let mut report = CliffDetectReport::new(&cfg, Path::new("cfg.json"), 32, 24);
        report.set_error(&CliffDetectError::MalformedFrame {
            width: 32,
            height: 24,
            expected_width: 64,
            expected_height: 48,
        });
        assert_eq!(
            report.error.as_deref(),
            Some("depth frame is 32x24, camera model expects 64x48")
        );
    }
}
