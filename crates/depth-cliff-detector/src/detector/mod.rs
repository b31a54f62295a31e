//! Cliff detector orchestration.
//!
//! This module owns the configuration surface, lazily rebuilds the row
//! table when the calibration or mount parameters change, runs the block
//! scan and projects flagged blocks through the camera model.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::{CliffDetectError, CliffParamsError};
pub use params::CliffDetectorParams;
pub use pipeline::CliffDetector;
pub use result::{CliffDetection, CliffPoint};
