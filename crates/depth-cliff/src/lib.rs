//! High-level facade crate for the `depth-cliff-*` workspace.
//!
//! This crate provides:
//! - re-exports of the camera/depth primitives and of the cliff detector
//! - (feature-gated) helpers that load 16-bit depth PNGs and run the detector
//!   on them end to end
//! - (feature `cli`) the `depth-cliff` command-line tool
//!
//! ## Quickstart
//!
//! ```no_run
//! use depth_cliff::detect;
//! use depth_cliff::{CameraInfo, CliffDetectorParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = CameraInfo::pinhole(640, 480, 525.0, 525.0, 319.5, 239.5);
//! let result = detect::detect_cliffs_in_png("depth.png", &camera, CliffDetectorParams::default())?;
//! for p in &result.points {
//!     println!("cliff {:.2} m ahead, {:.2} m left", p.ground.x, p.ground.y);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `depth_cliff::core`: camera model, ray helpers, depth frame types, logging.
//! - `depth_cliff::detector`: row geometry table, block scanner, `CliffDetector`.
//! - `depth_cliff::detect` (feature `image`): PNG load/save and one-shot detection.

pub use depth_cliff_core as core;
pub use depth_cliff_detector as detector;

pub use depth_cliff_core::{CameraInfo, DepthImage, DepthImageView, FrameHeader};
pub use depth_cliff_detector::{
    CliffDetectError, CliffDetection, CliffDetector, CliffDetectorParams, CliffPoint,
};

#[cfg(feature = "image")]
pub mod detect;
