use super::CliffParamsError;
use crate::scan::ScanParams;
use serde::{Deserialize, Serialize};

/// Configuration for the cliff detector.
///
/// Distances are metres, angles degrees. Missing JSON fields take their
/// default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliffDetectorParams {
    /// Readings below this are in the sensor's dead zone.
    pub range_min: f64,
    /// Readings above this are discarded.
    pub range_max: f64,
    /// Height of the optical centre above the floor.
    pub sensor_mount_height: f64,
    /// Downward pitch of the optical axis from horizontal.
    pub sensor_tilt_angle: f64,
    /// Tolerance added to the expected ground distance before a sample is
    /// considered cliff-consistent.
    pub ground_margin: f64,
    /// Return a copy of the frame with flagged blocks marked.
    pub publish_depth_enable: bool,
    /// Rebuild the camera model and row table on every frame.
    pub cam_model_update: bool,
    /// Block sampling.
    pub scan: ScanParams,
}

impl Default for CliffDetectorParams {
    fn default() -> Self {
        Self {
            range_min: 0.5,
            range_max: 5.0,
            sensor_mount_height: 0.4,
            sensor_tilt_angle: 20.0,
            ground_margin: 0.25,
            publish_depth_enable: false,
            cam_model_update: false,
            scan: ScanParams::default(),
        }
    }
}

impl CliffDetectorParams {
    /// Check every invariant of the parameter set.
    pub fn validate(&self) -> Result<(), CliffParamsError> {
        let (min, max) = (self.range_min, self.range_max);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min >= max {
            return Err(CliffParamsError::InvalidRange { min, max });
        }
        if !self.sensor_mount_height.is_finite() || self.sensor_mount_height <= 0.0 {
            return Err(CliffParamsError::NonPositiveMountHeight(
                self.sensor_mount_height,
            ));
        }
        if !self.sensor_tilt_angle.is_finite() || self.sensor_tilt_angle.abs() >= 90.0 {
            return Err(CliffParamsError::InvalidTiltAngle(self.sensor_tilt_angle));
        }
        if !self.ground_margin.is_finite() || self.ground_margin < 0.0 {
            return Err(CliffParamsError::InvalidGroundMargin(self.ground_margin));
        }
        if self.scan.block_size == 0 {
            return Err(CliffParamsError::ZeroBlockSize);
        }
        if self.scan.block_points_threshold == 0 {
            return Err(CliffParamsError::ZeroBlockPointsThreshold);
        }
        if self.scan.step_row == 0 || self.scan.step_col == 0 {
            return Err(CliffParamsError::ZeroStep {
                step_row: self.scan.step_row,
                step_col: self.scan.step_col,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(CliffDetectorParams::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_or_empty_range() {
        let params = CliffDetectorParams {
            range_min: 2.0,
            range_max: 2.0,
            ..CliffDetectorParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(CliffParamsError::InvalidRange { min: 2.0, max: 2.0 })
        );
    }

    #[test]
    fn rejects_bad_scan_settings() {
        let mut params = CliffDetectorParams::default();
        params.scan.block_size = 0;
        assert_eq!(params.validate(), Err(CliffParamsError::ZeroBlockSize));

        let mut params = CliffDetectorParams::default();
        params.scan.step_col = 0;
        assert!(matches!(
            params.validate(),
            Err(CliffParamsError::ZeroStep { step_col: 0, .. })
        ));
    }

    #[test]
    fn rejects_vertical_tilt() {
        let params = CliffDetectorParams {
            sensor_tilt_angle: 90.0,
            ..CliffDetectorParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(CliffParamsError::InvalidTiltAngle(90.0))
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: CliffDetectorParams = serde_json::from_str(
            r#"{"sensor_mount_height": 0.25, "scan": {"block_size": 16}}"#,
        )
        .expect("parse");
        assert_eq!(params.sensor_mount_height, 0.25);
        assert_eq!(params.scan.block_size, 16);
        assert_eq!(params.scan.step_row, 2);
        assert_eq!(params.range_max, 5.0);
    }
}
