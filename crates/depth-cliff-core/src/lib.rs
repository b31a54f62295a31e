//! Core types and utilities for depth-image cliff detection.
//!
//! This crate is intentionally small and purely geometric. It owns the
//! camera-model contract used by the detector, the ray primitives built on
//! top of it, and the depth frame types. It does *not* know anything about
//! cliffs, blocks or thresholds.

mod camera;
mod depth;
mod logger;
mod rays;

pub use camera::{
    BrownConrady5, CameraInfo, CameraModel, CameraModelError, FrameHeader, PinholeCameraModel,
};
pub use depth::{DepthFrame, DepthImage, DepthImageError, DepthImageView, DepthSample};
pub use rays::{angle_between_rays, signed_vertical_angle, vector_length};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
