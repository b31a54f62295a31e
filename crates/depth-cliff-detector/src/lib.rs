//! Cliff (descending stair / ledge) detection from a single depth frame.
//!
//! Pipeline per frame:
//! - build (or reuse) a per-row table of expected flat-floor distances from
//!   the camera model, sensor mount height and tilt,
//! - scan the bottom of the depth frame in coarse blocks and flag blocks
//!   where the measured floor is farther than expected,
//! - project one point per flagged block through the camera model.
//!
//! Camera models and depth frame types live in `depth-cliff-core`.

mod detector;
mod io;
mod row_geometry;
mod scan;

pub use detector::{
    CliffDetectError, CliffDetection, CliffDetector, CliffDetectorParams, CliffParamsError,
    CliffPoint,
};
pub use io::{CliffDetectConfig, CliffDetectReport, CliffIoError};
pub use row_geometry::GeometryError;

// Building blocks of `CliffDetector`, public for benches and synthetic frames.
#[doc(hidden)]
pub use row_geometry::{RowGeometry, RowGeometryTable, VerticalFov, NO_GROUND_MM};
pub use scan::{mark_blocks, scan_blocks, FlaggedBlock, ScanParams};

pub use depth_cliff_core::{CameraInfo, DepthImage, DepthImageView, FrameHeader};
