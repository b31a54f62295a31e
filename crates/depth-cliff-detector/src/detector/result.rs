use crate::scan::FlaggedBlock;
use depth_cliff_core::{DepthImage, FrameHeader};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// One detected cliff location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CliffPoint {
    /// Centre pixel `(column, row)` of the flagged block.
    pub pixel: Point2<f32>,
    /// 3D point in the camera optical frame (x right, y down, z forward), metres.
    pub camera: Point3<f32>,
    /// Ground-plane point `(forward, left)` relative to the floor point
    /// directly below the sensor, metres.
    pub ground: Point2<f32>,
}

/// Output of one detection call.
///
/// `points[i]` is the projection of `blocks[i]`; both follow the scan order
/// (bottom block row first, left to right).
#[derive(Clone, Debug, PartialEq)]
pub struct CliffDetection<T> {
    /// Frame id and stamp of the input frame.
    pub header: FrameHeader,
    pub points: Vec<CliffPoint>,
    pub blocks: Vec<FlaggedBlock>,
    /// Input frame with flagged blocks set to the marker value; only when
    /// `publish_depth_enable` is on.
    pub annotated: Option<DepthImage<T>>,
}

impl<T> CliffDetection<T> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Ground-plane points as a polygon, in scan order.
    pub fn ground_polygon(&self) -> Vec<Point2<f32>> {
        self.points.iter().map(|p| p.ground).collect()
    }

    /// Camera-frame points as a polygon, in scan order.
    pub fn camera_polygon(&self) -> Vec<Point3<f32>> {
        self.points.iter().map(|p| p.camera).collect()
    }
}
