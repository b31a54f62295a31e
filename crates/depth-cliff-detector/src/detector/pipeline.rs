use super::{CliffDetectError, CliffDetection, CliffDetectorParams, CliffParamsError, CliffPoint};
use crate::row_geometry::{GeometryError, RowGeometryTable};
use crate::scan::{mark_blocks, scan_blocks, FlaggedBlock};
use depth_cliff_core::{
    CameraInfo, CameraModel, CameraModelError, DepthImageView, DepthSample, PinholeCameraModel,
};
use nalgebra::{Point2, Point3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Camera model and the row table derived from it.
#[derive(Clone, Debug)]
struct Geometry {
    camera: PinholeCameraModel,
    table: RowGeometryTable,
}

/// Single-frame cliff detector.
///
/// Setters validate and store parameters and mark the row table stale; the
/// table is rebuilt on the next [`detect`](Self::detect) call. One instance
/// is meant to be driven from one thread; configuration updates and
/// detection calls must not overlap.
pub struct CliffDetector {
    params: CliffDetectorParams,
    geometry: Option<Geometry>,
    params_changed: bool,
}

impl CliffDetector {
    /// Create a detector with validated parameters.
    pub fn new(params: CliffDetectorParams) -> Result<Self, CliffParamsError> {
        params.validate()?;
        Ok(Self {
            params,
            geometry: None,
            params_changed: true,
        })
    }

    /// Detector parameters.
    #[inline]
    pub fn params(&self) -> &CliffDetectorParams {
        &self.params
    }

    /// Replace the whole parameter set.
    pub fn set_params(&mut self, params: CliffDetectorParams) -> Result<(), CliffParamsError> {
        self.update(|p| *p = params)
    }

    /// Apply `f` to a copy of the parameters and commit it only if it validates.
    fn update(
        &mut self,
        f: impl FnOnce(&mut CliffDetectorParams),
    ) -> Result<(), CliffParamsError> {
        let mut next = self.params.clone();
        f(&mut next);
        next.validate()?;
        self.params = next;
        self.params_changed = true;
        Ok(())
    }

    /// Minimum valid sensor range in metres.
    pub fn set_range_min(&mut self, range_min: f64) -> Result<(), CliffParamsError> {
        self.update(|p| p.range_min = range_min)
    }

    /// Maximum valid sensor range in metres.
    pub fn set_range_max(&mut self, range_max: f64) -> Result<(), CliffParamsError> {
        self.update(|p| p.range_max = range_max)
    }

    /// Set both range bounds at once.
    pub fn set_range(&mut self, range_min: f64, range_max: f64) -> Result<(), CliffParamsError> {
        self.update(|p| {
            p.range_min = range_min;
            p.range_max = range_max;
        })
    }

    /// Height of the sensor above the floor in metres.
    pub fn set_sensor_mount_height(&mut self, height: f64) -> Result<(), CliffParamsError> {
        self.update(|p| p.sensor_mount_height = height)
    }

    #[inline]
    pub fn sensor_mount_height(&self) -> f64 {
        self.params.sensor_mount_height
    }

    /// Downward pitch of the sensor in degrees.
    pub fn set_sensor_tilt_angle(&mut self, angle: f64) -> Result<(), CliffParamsError> {
        self.update(|p| p.sensor_tilt_angle = angle)
    }

    #[inline]
    pub fn sensor_tilt_angle(&self) -> f64 {
        self.params.sensor_tilt_angle
    }

    /// Ground margin in metres.
    pub fn set_ground_margin(&mut self, margin: f64) -> Result<(), CliffParamsError> {
        self.update(|p| p.ground_margin = margin)
    }

    /// Rows from the image bottom to scan; clamped to the image height at scan time.
    pub fn set_used_depth_height(&mut self, height: usize) {
        self.params.scan.used_depth_height = height;
        self.params_changed = true;
    }

    pub fn set_block_size(&mut self, size: usize) -> Result<(), CliffParamsError> {
        self.update(|p| p.scan.block_size = size)
    }

    pub fn set_block_points_threshold(&mut self, threshold: usize) -> Result<(), CliffParamsError> {
        self.update(|p| p.scan.block_points_threshold = threshold)
    }

    pub fn set_depth_image_step_row(&mut self, step: usize) -> Result<(), CliffParamsError> {
        self.update(|p| p.scan.step_row = step)
    }

    pub fn set_depth_image_step_col(&mut self, step: usize) -> Result<(), CliffParamsError> {
        self.update(|p| p.scan.step_col = step)
    }

    pub fn set_publish_depth_enable(&mut self, enable: bool) {
        self.params.publish_depth_enable = enable;
    }

    #[inline]
    pub fn publish_depth_enable(&self) -> bool {
        self.params.publish_depth_enable
    }

    /// Rebuild the camera model from every incoming `CameraInfo`.
    pub fn set_cam_model_update(&mut self, update: bool) {
        self.params.cam_model_update = update;
    }

    /// Force (or cancel) a row table rebuild on the next frame.
    pub fn set_params_changed(&mut self, changed: bool) {
        self.params_changed = changed;
    }

    /// True while a parameter change has not been folded into the row table yet.
    #[inline]
    pub fn params_changed(&self) -> bool {
        self.params_changed
    }

    /// Return the current geometry, rebuilding it when parameters changed,
    /// continuous updates are on, or `info` describes a different camera.
    ///
    /// On failure no geometry is kept, so a stale table is never reused.
    fn refresh_geometry(&mut self, info: &CameraInfo) -> Result<&Geometry, GeometryError> {
        let reuse = !self.params_changed && !self.params.cam_model_update;
        let current = self
            .geometry
            .take()
            .filter(|g| reuse && g.camera.camera_info().same_geometry(info));

        let geometry = match current {
            Some(g) => g,
            None => {
                let camera = PinholeCameraModel::from_camera_info(info)?;
                let table = RowGeometryTable::build(
                    &camera,
                    self.params.sensor_mount_height,
                    self.params.sensor_tilt_angle,
                    self.params.scan.used_depth_height,
                )?;
                self.params_changed = false;

                let scan = &self.params.scan;
                if scan.block_points_threshold > scan.samples_per_block() {
                    log::warn!(
                        "block_points_threshold {} exceeds the {} samples of a full block; no block can be flagged",
                        scan.block_points_threshold,
                        scan.samples_per_block()
                    );
                }
                Geometry { camera, table }
            }
        };
        Ok(&*self.geometry.insert(geometry))
    }

    /// Detect cliffs in one depth frame.
    ///
    /// `info` is the calibration that goes with `image`. Frames without any
    /// valid sample produce an empty detection.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image, info),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect<T: DepthSample>(
        &mut self,
        image: &DepthImageView<'_, T>,
        info: &CameraInfo,
    ) -> Result<CliffDetection<T>, CliffDetectError> {
        DepthImageView::new(image.width, image.height, image.data).inspect_err(|err| {
            log::warn!("cliff detection aborted: {err}");
        })?;

        let params = self.params.clone();
        let geometry = self.refresh_geometry(info).inspect_err(|err| {
            log::warn!("cliff detection aborted: {err}");
        })?;

        let (expected_width, expected_height) = geometry.camera.image_size();
        if image.width != expected_width || image.height != expected_height {
            log::warn!(
                "cliff detection aborted: frame {}x{} does not match calibration {}x{}",
                image.width,
                image.height,
                expected_width,
                expected_height
            );
            return Err(CliffDetectError::MalformedFrame {
                width: image.width,
                height: image.height,
                expected_width,
                expected_height,
            });
        }

        let blocks = scan_blocks(
            image,
            &geometry.table,
            &params.scan,
            params.range_min,
            params.range_max,
            params.ground_margin,
        );
        let points = blocks
            .iter()
            .map(|b| project_block(&geometry.camera, geometry.table.tilt(), b))
            .collect::<Result<Vec<_>, _>>()
            .map_err(GeometryError::from)?;

        log::debug!("flagged {} cliff blocks", blocks.len());

        let annotated = params.publish_depth_enable.then(|| {
            let mut annotated = image.to_owned_image();
            mark_blocks(&mut annotated, &blocks);
            annotated
        });

        Ok(CliffDetection {
            header: info.header.clone(),
            points,
            blocks,
            annotated,
        })
    }
}

/// Project a block's centre pixel at its mean cliff depth, and onto the
/// floor frame of a sensor pitched down by `tilt` radians.
fn project_block<C: CameraModel + ?Sized>(
    camera: &C,
    tilt: f64,
    block: &FlaggedBlock,
) -> Result<CliffPoint, CameraModelError> {
    let ray = camera.ray_for_pixel(Point2::new(block.col as f64, block.row as f64))?;
    let p = ray * block.mean_depth;
    let (sin, cos) = tilt.sin_cos();
    let forward = p.z * cos - p.y * sin;
    let left = -p.x;
    Ok(CliffPoint {
        pixel: Point2::new(block.col as f32, block.row as f32),
        camera: Point3::new(p.x as f32, p.y as f32, p.z as f32),
        ground: Point2::new(forward as f32, left as f32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_cliff_core::{DepthImage, DepthImageError, FrameHeader};

    fn info() -> CameraInfo {
        CameraInfo::pinhole(160, 120, 130.0, 130.0, 79.5, 59.5).with_header(FrameHeader {
            frame_id: "depth_optical".into(),
            stamp_ns: 1_000,
        })
    }

    fn params() -> CliffDetectorParams {
        let mut p = CliffDetectorParams {
            range_min: 0.2,
            range_max: 6.0,
            sensor_mount_height: 0.3,
            sensor_tilt_angle: 25.0,
            ground_margin: 0.05,
            ..CliffDetectorParams::default()
        };
        p.scan.used_depth_height = 40;
        p.scan.block_size = 8;
        p.scan.block_points_threshold = 8;
        p
    }

    fn far_frame() -> DepthImage<u16> {
        DepthImage::filled(160, 120, 4000).expect("frame")
    }

    #[test]
    fn rejected_setter_keeps_previous_value() {
        let mut d = CliffDetector::new(params()).expect("detector");
        d.set_params_changed(false);
        assert_eq!(
            d.set_sensor_mount_height(-1.0),
            Err(CliffParamsError::NonPositiveMountHeight(-1.0))
        );
        assert_eq!(d.sensor_mount_height(), 0.3);
        assert!(!d.params_changed());

        assert!(d.set_range_min(7.0).is_err());
        assert_eq!(d.params().range_min, 0.2);
        assert!(d.set_range(6.5, 7.0).is_ok());
        assert_eq!((d.params().range_min, d.params().range_max), (6.5, 7.0));
        assert!(d.params_changed());
    }

    #[test]
    fn rebuild_clears_the_changed_flag() {
        let mut d = CliffDetector::new(params()).expect("detector");
        assert!(d.params_changed());
        d.detect(&far_frame().view(), &info()).expect("detect");
        assert!(!d.params_changed());

        d.set_sensor_tilt_angle(30.0).expect("tilt");
        assert!(d.params_changed());
        assert_eq!(d.sensor_tilt_angle(), 30.0);
        d.detect(&far_frame().view(), &info()).expect("detect");
        assert!(!d.params_changed());
    }

    #[test]
    fn new_calibration_replaces_the_table() {
        let mut d = CliffDetector::new(params()).expect("detector");
        d.detect(&far_frame().view(), &info()).expect("detect");
        let first = d.geometry.as_ref().expect("geometry").table.clone();

        let mut other = info();
        other.fy = 100.0;
        d.detect(&far_frame().view(), &other).expect("detect");
        let second = d.geometry.as_ref().expect("geometry").table.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn far_floor_is_flagged_and_projected() {
        let mut d = CliffDetector::new(params()).expect("detector");
        let res = d.detect(&far_frame().view(), &info()).expect("detect");
        // 40 rows x 160 cols in 8 px blocks.
        assert_eq!(res.len(), 5 * 20);
        assert_eq!(res.header.frame_id, "depth_optical");
        assert!(res.annotated.is_none());

        let first = &res.points[0];
        assert_eq!(res.blocks[0].block_row, 4);
        assert_eq!(first.pixel, Point2::new(4.0, 116.0));
        assert!((first.camera.z - 4.0).abs() < 1e-4);
        assert!(first.ground.x > 0.0);
        // Left half of the image lies to the left of the robot.
        assert!(first.ground.y > 0.0);
        assert!(res.points[19].ground.y < 0.0);
    }

    #[test]
    fn annotated_frame_when_enabled() {
        let mut d = CliffDetector::new(params()).expect("detector");
        d.set_publish_depth_enable(true);
        assert!(d.publish_depth_enable());
        let res = d.detect(&far_frame().view(), &info()).expect("detect");
        let annotated = res.annotated.expect("annotated");
        assert_eq!(annotated.get(119, 0), Some(u16::MARKER));
        assert_eq!(annotated.get(79, 0), Some(4000));
    }

    #[test]
    fn all_invalid_frame_is_empty_not_an_error() {
        let mut d = CliffDetector::new(params()).expect("detector");
        let frame = DepthImage::filled(160, 120, 0u16).expect("frame");
        let res = d.detect(&frame.view(), &info()).expect("detect");
        assert!(res.is_empty());
    }

    #[test]
    fn mismatched_frame_is_malformed() {
        let mut d = CliffDetector::new(params()).expect("detector");
        let frame = DepthImage::filled(80, 60, 4000u16).expect("frame");
        assert_eq!(
            d.detect(&frame.view(), &info()).unwrap_err(),
            CliffDetectError::MalformedFrame {
                width: 80,
                height: 60,
                expected_width: 160,
                expected_height: 120
            }
        );

        let short = vec![4000u16; 10];
        let view = DepthImageView {
            width: 160,
            height: 120,
            data: &short,
        };
        assert!(matches!(
            d.detect(&view, &info()),
            Err(CliffDetectError::MalformedFrameBuffer(
                DepthImageError::BufferSize { got: 10, .. }
            ))
        ));
    }

    #[test]
    fn bad_calibration_aborts_then_recovers() {
        let mut d = CliffDetector::new(params()).expect("detector");
        let frame = far_frame();
        d.detect(&frame.view(), &info()).expect("detect");

        let mut broken = info();
        broken.fx = 0.0;
        assert!(matches!(
            d.detect(&frame.view(), &broken),
            Err(CliffDetectError::InvalidGeometry(GeometryError::Camera(
                CameraModelError::InvalidFocalLength { .. }
            )))
        ));
        assert!(d.geometry.is_none());

        let res = d.detect(&frame.view(), &info()).expect("detect");
        assert_eq!(res.len(), 100);
    }

    #[test]
    fn continuous_model_update_rebuilds_every_frame() {
        let mut d = CliffDetector::new(params()).expect("detector");
        d.set_cam_model_update(true);
        let a = d.detect(&far_frame().view(), &info()).expect("detect");
        let b = d.detect(&far_frame().view(), &info()).expect("detect");
        assert_eq!(a, b);
    }
}
