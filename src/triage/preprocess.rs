//! Chest X-ray preprocessing for the classifier.
//!
//! Must match the transform the network was trained with:
//! 3-channel RGB, 224x224, float, per-image standardization
//! (subtract mean, divide by population std unless it is zero),
//! batched as `[1, 224, 224, 3]` (NHWC).

use std::path::Path;

use image::imageops::FilterType;
use image::{GenericImageView, RgbImage};
use tracing::debug;

use super::ClassificationError;

/// Square input dimension expected by the network.
pub const INPUT_SIZE: u32 = 224;

/// Color channels per pixel.
pub const CHANNELS: usize = 3;

/// Standardized single-image batch in NHWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode the file and run the full transform.
///
/// Missing files and undecodable bytes are both `ImageError`-class
/// failures; neither reaches the model.
pub fn preprocess_image(path: &Path) -> Result<ImageTensor, ClassificationError> {
    if !path.is_file() {
        return Err(ClassificationError::ImageNotFound(path.to_path_buf()));
    }

    let decoded = image::open(path)
        .map_err(|e| ClassificationError::ImageDecode(format!("{}: {e}", path.display())))?;
    debug!(
        path = %path.display(),
        width = decoded.width(),
        height = decoded.height(),
        "Decoded image for classification"
    );

    Ok(preprocess_rgb(&decoded.to_rgb8()))
}

/// Resize + standardize an already-decoded RGB image.
pub fn preprocess_rgb(rgb: &RgbImage) -> ImageTensor {
    // Bicubic resampling, the default of the imaging library used in training
    let resized = image::imageops::resize(rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut data: Vec<f32> = resized.as_raw().iter().map(|&v| v as f32).collect();
    standardize(&mut data);

    ImageTensor {
        shape: [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS],
        data,
    }
}

/// In-place per-image standardization over all pixels and channels.
///
/// Accumulates in f64 to keep the mean stable over ~150k samples.
pub fn standardize(data: &mut [f32]) {
    if data.is_empty() {
        return;
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    for v in data.iter_mut() {
        *v -= mean as f32;
    }

    let variance = data.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std > 0.0 {
        for v in data.iter_mut() {
            *v /= std as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn output_shape_is_single_nhwc_batch() {
        let tensor = preprocess_rgb(&gradient(640, 480));
        assert_eq!(tensor.shape, [1, 224, 224, 3]);
        assert_eq!(tensor.len(), 224 * 224 * 3);
    }

    #[test]
    fn standardized_output_has_zero_mean_unit_std() {
        let tensor = preprocess_rgb(&gradient(300, 300));
        let n = tensor.len() as f64;
        let mean = tensor.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = tensor.data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-4, "mean was {mean}");
        assert!((var.sqrt() - 1.0).abs() < 1e-3, "std was {}", var.sqrt());
    }

    #[test]
    fn uniform_input_skips_division() {
        let mut data = vec![120.0f32; 48];
        standardize(&mut data);
        assert!(data.iter().all(|&v| v == 0.0));

        let flat = RgbImage::from_pixel(50, 50, Rgb([120, 120, 120]));
        let tensor = preprocess_rgb(&flat);
        assert!(tensor.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn standardize_matches_hand_computation() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0];
        standardize(&mut data);
        // mean 2.5, population std sqrt(1.25)
        let std = 1.25f32.sqrt();
        let expected = [-1.5 / std, -0.5 / std, 0.5 / std, 1.5 / std];
        for (got, want) in data.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_file_is_image_not_found() {
        let err = preprocess_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageNotFound(_)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"not an image at all").unwrap();
        let err = preprocess_image(&path).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageDecode(_)));
    }

    #[test]
    fn grayscale_png_is_expanded_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xray.png");
        let gray = image::GrayImage::from_fn(64, 80, |x, y| image::Luma([((x * y) % 256) as u8]));
        gray.save(&path).unwrap();
        let tensor = preprocess_image(&path).unwrap();
        assert_eq!(tensor.shape, [1, 224, 224, 3]);
    }
}
