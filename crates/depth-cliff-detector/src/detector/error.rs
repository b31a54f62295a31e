use crate::row_geometry::GeometryError;
use depth_cliff_core::DepthImageError;

/// Errors returned by [`CliffDetector::detect`](super::CliffDetector::detect).
///
/// Each error aborts only the current call; the next well-formed frame is
/// processed normally.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CliffDetectError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error(
        "depth frame is {width}x{height}, camera model expects {expected_width}x{expected_height}"
    )]
    MalformedFrame {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
    #[error(transparent)]
    MalformedFrameBuffer(#[from] DepthImageError),
}

/// Parameter validation errors. A rejected update leaves the previous
/// configuration in place.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CliffParamsError {
    #[error("sensor range must satisfy 0 <= range_min < range_max (got {min}..{max})")]
    InvalidRange { min: f64, max: f64 },
    #[error("sensor mount height must be finite and > 0 (got {0})")]
    NonPositiveMountHeight(f64),
    #[error("sensor tilt angle must be finite and within (-90, 90) degrees (got {0})")]
    InvalidTiltAngle(f64),
    #[error("ground margin must be finite and >= 0 (got {0})")]
    InvalidGroundMargin(f64),
    #[error("block size must be > 0")]
    ZeroBlockSize,
    #[error("block points threshold must be > 0")]
    ZeroBlockPointsThreshold,
    #[error("depth image row and column steps must be >= 1 (got {step_row}, {step_col})")]
    ZeroStep { step_row: usize, step_col: usize },
}
