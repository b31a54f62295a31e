//! Calibrated camera model contract and a pinhole implementation.
//!
//! The detector only talks to [`CameraModel`]; [`PinholeCameraModel`] is the
//! stock implementation built from a [`CameraInfo`] message.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors reported by camera models.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("focal lengths must be finite and > 0 (fx={fx}, fy={fy})")]
    InvalidFocalLength { fx: f64, fy: f64 },
    #[error("principal point must be finite (cx={cx}, cy={cy})")]
    NonFinitePrincipalPoint { cx: f64, cy: f64 },
    #[error("distortion coefficients must be finite")]
    NonFiniteDistortion,
    #[error("no ray for pixel ({u}, {v})")]
    RayUnavailable { u: f64, v: f64 },
    #[error("ray does not point in front of the camera")]
    RayBehindCamera,
}

/// Source frame and acquisition time of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Coordinate frame of the optical centre (e.g. `camera_depth_optical_frame`).
    #[serde(default)]
    pub frame_id: String,
    /// Acquisition time in nanoseconds.
    #[serde(default)]
    pub stamp_ns: u64,
}

/// Brown-Conrady radial (k1, k2, k3) and tangential (p1, p2) distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    #[serde(default)]
    pub k1: f64,
    #[serde(default)]
    pub k2: f64,
    #[serde(default)]
    pub k3: f64,
    #[serde(default)]
    pub p1: f64,
    #[serde(default)]
    pub p2: f64,
    /// Fixed-point iterations used when removing distortion.
    #[serde(default = "default_undistort_iters")]
    pub iters: u32,
}

fn default_undistort_iters() -> u32 {
    8
}

impl Default for BrownConrady5 {
    fn default() -> Self {
        Self {
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            p1: 0.0,
            p2: 0.0,
            iters: default_undistort_iters(),
        }
    }
}

impl BrownConrady5 {
    fn is_identity(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }

    fn is_finite(&self) -> bool {
        [self.k1, self.k2, self.k3, self.p1, self.p2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Apply distortion to normalized image coordinates.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (x * radial + dx, y * radial + dy)
    }

    /// Remove distortion from normalized image coordinates.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        if self.is_identity() {
            return (xd, yd);
        }
        let (mut x, mut y) = (xd, yd);
        for _ in 0..self.iters {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        (x, y)
    }
}

/// Calibration message accompanying every depth frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    #[serde(default)]
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub distortion: BrownConrady5,
}

impl CameraInfo {
    /// Undistorted pinhole calibration with an empty header.
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            header: FrameHeader::default(),
            width,
            height,
            fx,
            fy,
            cx,
            cy,
            distortion: BrownConrady5::default(),
        }
    }

    /// Same calibration, different header.
    pub fn with_header(mut self, header: FrameHeader) -> Self {
        self.header = header;
        self
    }

    /// True when `other` describes the same image geometry (the header is ignored).
    pub fn same_geometry(&self, other: &CameraInfo) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.fx == other.fx
            && self.fy == other.fy
            && self.cx == other.cx
            && self.cy == other.cy
            && self.distortion == other.distortion
    }
}

/// Pixel ↔ ray mapping of a calibrated camera.
///
/// Pixel coordinates are `(u, v) = (column, row)`, with integer values at
/// pixel centres. Rays live in the optical frame and are normalized to
/// `z = 1`, so a z-depth `d` maps a pixel to the 3D point `ray * d`.
pub trait CameraModel {
    /// Image size as `(width, height)`.
    fn image_size(&self) -> (usize, usize);

    /// Viewing ray through a pixel.
    fn ray_for_pixel(&self, pixel: Point2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Pixel hit by a ray.
    fn pixel_for_ray(&self, ray: &Vector3<f64>) -> Result<Point2<f64>, CameraModelError>;
}

/// Pinhole camera with optional Brown-Conrady distortion.
#[derive(Clone, Debug, PartialEq)]
pub struct PinholeCameraModel {
    info: CameraInfo,
}

impl PinholeCameraModel {
    /// Validate a calibration message and build the model from it.
    pub fn from_camera_info(info: &CameraInfo) -> Result<Self, CameraModelError> {
        if info.width == 0 || info.height == 0 {
            return Err(CameraModelError::EmptyImage {
                width: info.width,
                height: info.height,
            });
        }
        if !(info.fx.is_finite() && info.fy.is_finite()) || info.fx <= 0.0 || info.fy <= 0.0 {
            return Err(CameraModelError::InvalidFocalLength {
                fx: info.fx,
                fy: info.fy,
            });
        }
        if !(info.cx.is_finite() && info.cy.is_finite()) {
            return Err(CameraModelError::NonFinitePrincipalPoint {
                cx: info.cx,
                cy: info.cy,
            });
        }
        if !info.distortion.is_finite() {
            return Err(CameraModelError::NonFiniteDistortion);
        }
        Ok(Self { info: info.clone() })
    }

    /// Calibration the model was built from.
    #[inline]
    pub fn camera_info(&self) -> &CameraInfo {
        &self.info
    }
}

impl CameraModel for PinholeCameraModel {
    fn image_size(&self) -> (usize, usize) {
        (self.info.width as usize, self.info.height as usize)
    }

    fn ray_for_pixel(&self, pixel: Point2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let xd = (pixel.x - self.info.cx) / self.info.fx;
        let yd = (pixel.y - self.info.cy) / self.info.fy;
        let (x, y) = self.info.distortion.undistort(xd, yd);
        if !(x.is_finite() && y.is_finite()) {
            return Err(CameraModelError::RayUnavailable {
                u: pixel.x,
                v: pixel.y,
            });
        }
        Ok(Vector3::new(x, y, 1.0))
    }

    fn pixel_for_ray(&self, ray: &Vector3<f64>) -> Result<Point2<f64>, CameraModelError> {
        if !(ray.z.is_finite() && ray.z > 0.0) {
            return Err(CameraModelError::RayBehindCamera);
        }
        let (xd, yd) = self.info.distortion.distort(ray.x / ray.z, ray.y / ray.z);
        Ok(Point2::new(
            self.info.fx * xd + self.info.cx,
            self.info.fy * yd + self.info.cy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vga() -> CameraInfo {
        CameraInfo::pinhole(640, 480, 525.0, 525.0, 319.5, 239.5)
    }

    #[test]
    fn principal_point_maps_to_optical_axis() {
        let model = PinholeCameraModel::from_camera_info(&vga()).expect("model");
        let ray = model
            .ray_for_pixel(Point2::new(319.5, 239.5))
            .expect("ray");
        assert_relative_eq!(ray, Vector3::new(0.0, 0.0, 1.0));
        let px = model.pixel_for_ray(&Vector3::z()).expect("pixel");
        assert_relative_eq!(px, Point2::new(319.5, 239.5));
    }

    #[test]
    fn distorted_pixels_round_trip() {
        let mut info = vga();
        info.distortion = BrownConrady5 {
            k1: -0.05,
            k2: 0.01,
            p1: 0.001,
            p2: -0.0005,
            iters: 20,
            ..BrownConrady5::default()
        };
        let model = PinholeCameraModel::from_camera_info(&info).expect("model");
        for (u, v) in [(0.0, 0.0), (639.0, 479.0), (100.0, 400.0), (319.5, 10.0)] {
            let ray = model.ray_for_pixel(Point2::new(u, v)).expect("ray");
            let back = model.pixel_for_ray(&ray).expect("pixel");
            assert_relative_eq!(back.x, u, epsilon = 1e-3);
            assert_relative_eq!(back.y, v, epsilon = 1e-3);
        }
    }

    #[test]
    fn rejects_degenerate_calibration() {
        let mut empty = vga();
        empty.height = 0;
        assert_eq!(
            PinholeCameraModel::from_camera_info(&empty),
            Err(CameraModelError::EmptyImage {
                width: 640,
                height: 0
            })
        );

        let mut no_focal = vga();
        no_focal.fx = 0.0;
        assert!(matches!(
            PinholeCameraModel::from_camera_info(&no_focal),
            Err(CameraModelError::InvalidFocalLength { .. })
        ));

        let mut nan_cy = vga();
        nan_cy.cy = f64::NAN;
        assert!(matches!(
            PinholeCameraModel::from_camera_info(&nan_cy),
            Err(CameraModelError::NonFinitePrincipalPoint { .. })
        ));
    }

    #[test]
    fn ray_behind_camera_has_no_pixel() {
        let model = PinholeCameraModel::from_camera_info(&vga()).expect("model");
        assert_eq!(
            model.pixel_for_ray(&Vector3::new(0.0, 0.0, -1.0)),
            Err(CameraModelError::RayBehindCamera)
        );
    }

    #[test]
    fn same_geometry_ignores_header() {
        let a = vga();
        let b = vga().with_header(FrameHeader {
            frame_id: "depth_optical".into(),
            stamp_ns: 42,
        });
        assert!(a.same_geometry(&b));
        let mut c = vga();
        c.fy = 500.0;
        assert!(!a.same_geometry(&c));
    }

    #[test]
    fn camera_info_json_defaults_distortion() {
        let info: CameraInfo = serde_json::from_str(
            r#"{"width":320,"height":240,"fx":260.0,"fy":260.0,"cx":160.0,"cy":120.0}"#,
        )
        .expect("parse");
        assert_eq!(info.distortion, BrownConrady5::default());
        assert_eq!(info.header, FrameHeader::default());
    }
}
