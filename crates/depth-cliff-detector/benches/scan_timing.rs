//! Timing of row table construction and full-frame detection.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use depth_cliff_core::PinholeCameraModel;
use depth_cliff_detector::{
    CameraInfo, CliffDetector, CliffDetectorParams, DepthImage, RowGeometryTable,
};
use std::hint::black_box;

fn camera_info() -> CameraInfo {
    CameraInfo::pinhole(640, 480, 525.0, 525.0, 319.5, 239.5)
}

/// Floor with a drop-off across the upper half of the scanned band.
fn stair_frame(params: &CliffDetectorParams) -> DepthImage<u16> {
    let camera = PinholeCameraModel::from_camera_info(&camera_info()).expect("camera");
    let table = RowGeometryTable::build(
        &camera,
        params.sensor_mount_height,
        params.sensor_tilt_angle,
        params.scan.used_depth_height,
    )
    .expect("row table");
    DepthImage::from_fn(640, 480, |row, _| {
        let step = if row < 400 { 0.3 } else { 0.0 };
        table
            .flat_floor_depth(row)
            .map_or(0, |d| ((d + step) * 1000.0).round() as u16)
    })
    .expect("frame")
}

fn bench_row_table(c: &mut Criterion) {
    let camera = PinholeCameraModel::from_camera_info(&camera_info()).expect("camera");
    c.bench_function("row_table_build_480", |b| {
        b.iter(|| RowGeometryTable::build(black_box(&camera), 0.4, 20.0, 320).expect("table"))
    });
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_640x480");
    for step in [1usize, 2, 4] {
        let mut params = CliffDetectorParams::default();
        params.scan.step_row = step;
        params.scan.step_col = step;
        params.scan.block_points_threshold = 1;
        let frame = stair_frame(&params);
        let mut detector = CliffDetector::new(params).expect("detector");

        group.bench_with_input(BenchmarkId::new("step", step), &frame, |b, frame| {
            b.iter(|| {
                detector
                    .detect(black_box(&frame.view()), &camera_info())
                    .expect("detect")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_row_table, bench_detect);
criterion_main!(benches);
