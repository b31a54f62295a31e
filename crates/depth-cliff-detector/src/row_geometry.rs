//! Per-row flat-floor geometry.
//!
//! For every image row in the scanned band the table stores:
//! - `delta_angle`: angle of the row's central ray below the optical axis,
//!   interpolated linearly across the vertical field of view,
//! - `ground_distance_mm`: horizontal distance (from the point on the floor
//!   below the sensor) at which that ray meets a flat floor, or
//!   [`NO_GROUND_MM`] when the ray never comes down to the floor,
//! - `tilt_compensation`: divisor turning a z-depth reading taken on that
//!   row into the same horizontal distance.
//!
//! With `θ = tilt + δ`, a flat floor at height `h` is hit at z-depth
//! `h·cos δ / sin θ`, horizontal distance `h / tan θ`, so the divisor is
//! `cos δ / cos θ`.
//!
//! Close to straight down the horizontal distance shrinks to nothing and
//! then folds back behind the sensor. Rows with `θ >= NEAR_NADIR` store the
//! expected z-depth instead, with a divisor of `1`.

use depth_cliff_core::{
    angle_between_rays, signed_vertical_angle, CameraModel, CameraModelError,
};
use nalgebra::{Point2, Vector3};
use std::f64::consts::PI;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Ground distance of rows whose ray never reaches the floor.
pub const NO_GROUND_MM: u32 = u32::MAX;

/// Rays at least this steep are compared by z-depth.
const NEAR_NADIR: f64 = 85.0 * PI / 180.0;

/// Errors raised while deriving the row table from the camera model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error(transparent)]
    Camera(#[from] CameraModelError),
    #[error("sensor mount height must be finite and > 0 (got {0})")]
    NonPositiveMountHeight(f64),
    #[error("sensor tilt angle must be finite (got {0})")]
    NonFiniteTilt(f64),
    #[error("degenerate vertical field of view (top={top}, bottom={bottom})")]
    DegenerateFieldOfView { top: f64, bottom: f64 },
    #[error("ray angle does not increase with image row at row {row}")]
    NonMonotonicRows { row: usize },
}

/// Vertical field of view split at the optical centre.
///
/// Angles are signed, positive below the optical axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerticalFov {
    /// Angle of the top image row.
    pub top: f64,
    /// Angle of the bottom image row.
    pub bottom: f64,
    /// Image row of the optical centre (may be fractional or off-image).
    pub center_row: f64,
    /// Image column the rays were sampled on.
    pub column: f64,
    pub image_height: usize,
}

impl VerticalFov {
    /// Measure the field of view on the optical-centre column.
    ///
    /// The upper and lower parts are the angles between the optical-centre
    /// ray and the rays of the first and last image rows.
    pub fn measure<C: CameraModel + ?Sized>(camera: &C) -> Result<Self, GeometryError> {
        let (width, height) = camera.image_size();
        if width == 0 || height == 0 {
            return Err(CameraModelError::EmptyImage {
                width: width as u32,
                height: height as u32,
            }
            .into());
        }
        let center = camera.pixel_for_ray(&Vector3::z())?;
        let bottom_row = (height - 1) as f64;

        let top_ray = camera.ray_for_pixel(Point2::new(center.x, 0.0))?;
        let center_ray = camera.ray_for_pixel(center)?;
        let bottom_ray = camera.ray_for_pixel(Point2::new(center.x, bottom_row))?;

        let top = signed_angle_from_center(&center_ray, &top_ray);
        let bottom = signed_angle_from_center(&center_ray, &bottom_ray);
        match (top, bottom) {
            (Some(top), Some(bottom)) if top.is_finite() && bottom.is_finite() && top < bottom => {
                Ok(Self {
                    top,
                    bottom,
                    center_row: center.y,
                    column: center.x,
                    image_height: height,
                })
            }
            (top, bottom) => Err(GeometryError::DegenerateFieldOfView {
                top: top.unwrap_or(f64::NAN),
                bottom: bottom.unwrap_or(f64::NAN),
            }),
        }
    }

    /// Total vertical field of view in radians.
    #[inline]
    pub fn span(&self) -> f64 {
        self.bottom - self.top
    }

    /// Ray angle of `row`, linear between the optical centre and the image
    /// edge on the row's side of it.
    pub fn delta_for_row(&self, row: usize) -> f64 {
        let r = row as f64;
        let c = self.center_row;
        let bottom_row = (self.image_height - 1) as f64;
        if r >= c {
            let span = bottom_row - c;
            if span <= f64::EPSILON {
                0.0
            } else {
                self.bottom * (r - c) / span
            }
        } else if c <= f64::EPSILON {
            0.0
        } else {
            self.top * (c - r) / c
        }
    }
}

fn signed_angle_from_center(center: &Vector3<f64>, ray: &Vector3<f64>) -> Option<f64> {
    let magnitude = angle_between_rays(center, ray)?;
    let sign = if signed_vertical_angle(ray) < signed_vertical_angle(center) {
        -1.0
    } else {
        1.0
    };
    Some(sign * magnitude)
}

/// Geometry of a single image row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowGeometry {
    pub row: usize,
    pub delta_angle: f64,
    pub ground_distance_mm: u32,
    pub tilt_compensation: f64,
}

impl RowGeometry {
    /// True when the row's ray meets the floor.
    #[inline]
    pub fn sees_ground(&self) -> bool {
        self.ground_distance_mm != NO_GROUND_MM
    }
}

/// Flat-floor expectations for the bottom `used_depth_height` rows.
#[derive(Clone, Debug, PartialEq)]
pub struct RowGeometryTable {
    first_row: usize,
    image_height: usize,
    mount_height: f64,
    tilt: f64,
    fov: VerticalFov,
    delta_angle: Vec<f64>,
    ground_distance_mm: Vec<u32>,
    tilt_compensation: Vec<f64>,
}

impl RowGeometryTable {
    /// Derive the table for a sensor `mount_height` metres above the floor,
    /// pitched down by `tilt_deg` degrees.
    ///
    /// `used_depth_height` is clamped to the image height.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(camera)))]
    pub fn build<C: CameraModel + ?Sized>(
        camera: &C,
        mount_height: f64,
        tilt_deg: f64,
        used_depth_height: usize,
    ) -> Result<Self, GeometryError> {
        if !mount_height.is_finite() || mount_height <= 0.0 {
            return Err(GeometryError::NonPositiveMountHeight(mount_height));
        }
        if !tilt_deg.is_finite() {
            return Err(GeometryError::NonFiniteTilt(tilt_deg));
        }

        let fov = VerticalFov::measure(camera)?;
        let image_height = fov.image_height;
        let first_row = image_height - used_depth_height.min(image_height);
        check_monotonic_rows(camera, &fov, first_row)?;

        let tilt = tilt_deg.to_radians();
        let rows = image_height - first_row;
        let mut delta_angle = Vec::with_capacity(rows);
        let mut ground_distance_mm = Vec::with_capacity(rows);
        let mut tilt_compensation = Vec::with_capacity(rows);

        for row in first_row..image_height {
            let delta = fov.delta_for_row(row);
            let theta = tilt + delta;
            delta_angle.push(delta);
            if theta < NEAR_NADIR {
                ground_distance_mm.push(ground_distance_for(mount_height, theta));
                tilt_compensation.push(delta.cos() / theta.cos());
            } else {
                ground_distance_mm.push(floor_depth_mm(mount_height, delta, theta));
                tilt_compensation.push(1.0);
            }
        }

        log::debug!(
            "row table: rows {}..{}, fov top={:.4} bottom={:.4} rad, tilt={:.2} deg",
            first_row,
            image_height,
            fov.top,
            fov.bottom,
            tilt_deg
        );

        Ok(Self {
            first_row,
            image_height,
            mount_height,
            tilt,
            fov,
            delta_angle,
            ground_distance_mm,
            tilt_compensation,
        })
    }

    /// First image row covered by the table.
    #[inline]
    pub fn first_row(&self) -> usize {
        self.first_row
    }

    /// Image height the table was built for; the last covered row is `image_height - 1`.
    #[inline]
    pub fn image_height(&self) -> usize {
        self.image_height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.delta_angle.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delta_angle.is_empty()
    }

    #[inline]
    pub fn fov(&self) -> &VerticalFov {
        &self.fov
    }

    /// Sensor tilt in radians.
    #[inline]
    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    #[inline]
    pub fn mount_height(&self) -> f64 {
        self.mount_height
    }

    /// Geometry of `row`, `None` outside the covered band.
    #[inline]
    pub fn row(&self, row: usize) -> Option<RowGeometry> {
        let i = row.checked_sub(self.first_row)?;
        Some(RowGeometry {
            row,
            delta_angle: *self.delta_angle.get(i)?,
            ground_distance_mm: self.ground_distance_mm[i],
            tilt_compensation: self.tilt_compensation[i],
        })
    }

    /// All covered rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = RowGeometry> + '_ {
        (self.first_row..self.image_height).filter_map(|r| self.row(r))
    }

    /// z-depth in metres a flat floor produces on `row`, `None` when the
    /// row does not see the floor.
    pub fn flat_floor_depth(&self, row: usize) -> Option<f64> {
        let g = self.row(row)?;
        if !g.sees_ground() {
            return None;
        }
        let theta = self.tilt + g.delta_angle;
        Some(self.mount_height * g.delta_angle.cos() / theta.sin())
    }
}

fn ground_distance_for(mount_height: f64, theta: f64) -> u32 {
    if theta <= 0.0 {
        return NO_GROUND_MM;
    }
    to_mm(mount_height / theta.tan())
}

fn floor_depth_mm(mount_height: f64, delta: f64, theta: f64) -> u32 {
    let sin = theta.sin();
    if sin <= 0.0 {
        return NO_GROUND_MM;
    }
    to_mm(mount_height * delta.cos() / sin)
}

fn to_mm(meters: f64) -> u32 {
    let mm = (meters * 1000.0).round();
    if mm.is_finite() && mm >= 0.0 && mm < NO_GROUND_MM as f64 {
        mm as u32
    } else {
        NO_GROUND_MM
    }
}

/// The linear row-to-angle model only holds when ray angle grows with the
/// image row; check it on the scanned band.
fn check_monotonic_rows<C: CameraModel + ?Sized>(
    camera: &C,
    fov: &VerticalFov,
    first_row: usize,
) -> Result<(), GeometryError> {
    let mut prev: Option<f64> = None;
    for row in first_row..fov.image_height {
        let ray = camera.ray_for_pixel(Point2::new(fov.column, row as f64))?;
        let angle = signed_vertical_angle(&ray);
        if !angle.is_finite() || prev.is_some_and(|p| angle <= p) {
            return Err(GeometryError::NonMonotonicRows { row });
        }
        prev = Some(angle);
    }
    Ok(())
}
