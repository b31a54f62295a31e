use crate::{core, detector};
use ::image::{DynamicImage, ImageBuffer, ImageReader, Luma};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// 16-bit single-channel image holding depth in millimetres.
pub type Depth16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error("depth PNG must be 16-bit grayscale (got {color})")]
    UnsupportedDepthFormat { color: String },

    #[error("depth image too large to encode (width={width}, height={height})")]
    InvalidDepthDimensions { width: usize, height: usize },

    #[error(transparent)]
    DepthBuffer(#[from] core::DepthImageError),

    #[error(transparent)]
    Params(#[from] detector::CliffParamsError),

    #[error(transparent)]
    Detect(#[from] detector::CliffDetectError),
}

/// Copy a 16-bit grayscale image into a millimetre depth frame.
pub fn depth_image_from_luma16(img: &Depth16Image) -> Result<core::DepthImage<u16>, DetectError> {
    Ok(core::DepthImage::new(
        img.width() as usize,
        img.height() as usize,
        img.as_raw().clone(),
    )?)
}

/// Load a 16-bit grayscale PNG (millimetres, 0 = no reading).
pub fn load_depth_png(path: impl AsRef<Path>) -> Result<core::DepthImage<u16>, DetectError> {
    match ImageReader::open(path).map_err(::image::ImageError::from)?.decode()? {
        DynamicImage::ImageLuma16(img) => depth_image_from_luma16(&img),
        other => Err(DetectError::UnsupportedDepthFormat {
            color: format!("{:?}", other.color()),
        }),
    }
}

/// Write a millimetre depth frame as a 16-bit grayscale PNG.
pub fn save_depth_png(
    depth: &core::DepthImage<u16>,
    path: impl AsRef<Path>,
) -> Result<(), DetectError> {
    let (width, height) = (depth.width, depth.height);
    let dims = u32::try_from(width).ok().zip(u32::try_from(height).ok());
    let img = dims
        .and_then(|(w, h)| Depth16Image::from_raw(w, h, depth.data.clone()))
        .ok_or(DetectError::InvalidDepthDimensions { width, height })?;
    img.save(path)?;
    Ok(())
}

/// Load a depth PNG and run a freshly configured detector on it.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(path, camera, params), fields(width = camera.width, height = camera.height))
)]
pub fn detect_cliffs_in_png(
    path: impl AsRef<Path>,
    camera: &core::CameraInfo,
    params: detector::CliffDetectorParams,
) -> Result<detector::CliffDetection<u16>, DetectError> {
    let depth = load_depth_png(path)?;
    let mut cliff = detector::CliffDetector::new(params)?;
    let res = cliff.detect(&depth.view(), camera)?;
    log::info!("{} cliff points in {}x{} frame", res.len(), depth.width, depth.height);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_keeps_millimetres() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("depth.png");
        let depth = core::DepthImage::from_fn(8, 4, |r, c| (r * 1000 + c) as u16).expect("frame");
        save_depth_png(&depth, &path).expect("save");
        assert_eq!(load_depth_png(&path).expect("load"), depth);
    }

    #[test]
    fn eight_bit_png_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gray8.png");
        ::image::GrayImage::new(4, 4).save(&path).expect("save");
        assert!(matches!(
            load_depth_png(&path),
            Err(DetectError::UnsupportedDepthFormat { .. })
        ));
    }

    #[test]
    fn detects_on_png_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("far.png");
        let depth = core::DepthImage::filled(64, 48, 3000u16).expect("frame");
        save_depth_png(&depth, &path).expect("save");

        let camera = core::CameraInfo::pinhole(64, 48, 60.0, 60.0, 31.5, 23.5);
        let mut params = detector::CliffDetectorParams::default();
        params.scan.used_depth_height = 16;
        let res = detect_cliffs_in_png(&path, &camera, params).expect("detect");
        assert_eq!(res.len(), 2 * 8);
    }
}
