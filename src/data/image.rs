//! Conversions between image files and network input vectors.
use std::path::Path;

use image::{imageops::FilterType, GrayImage, ImageFormat, Luma};

use crate::data::{IMAGE_SIDE, IMAGE_PIXELS};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Decodes image bytes (PNG/JPEG/BMP/GIF), resizes to 28x28, converts to
/// grayscale and normalizes pixels to [0, 1].
///
/// Returns a flat row-major `Vec<f64>` of length 784.
pub fn image_bytes_to_input(bytes: &[u8]) -> Result<Vec<f64>> {
    let img = image::load_from_memory(bytes)?;
    let side = IMAGE_SIDE as u32;
    let resized = img.resize_exact(side, side, FilterType::Lanczos3);
    let gray = resized.to_luma8();
    Ok(gray.pixels().map(|p| p.0[0] as f64 / 255.0).collect())
}

pub fn load_image_input<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    image_bytes_to_input(&std::fs::read(path)?)
}

/// Writes column `column` of a 784-row image matrix out as a 28x28 PNG.
/// Handy for checking that a dataset was decoded the right way round.
pub fn save_column_as_image<P: AsRef<Path>>(images: &Matrix, column: usize, path: P) -> Result<()> {
    if column >= images.cols {
        return Err(Error::Config(format!(
            "image index {} is out of range for {} images",
            column, images.cols
        )));
    }
    if images.rows != IMAGE_PIXELS {
        return Err(Error::Shape(format!(
            "expected {} pixels per image, got {}",
            IMAGE_PIXELS, images.rows
        )));
    }

    let side = IMAGE_SIDE as u32;
    let img = GrayImage::from_fn(side, side, |x, y| {
        let value = images.data[(y * side + x) as usize][column];
        Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
    });
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_column_reloads_as_the_same_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digit.png");

        let pixels = vec![153.0 / 255.0; IMAGE_PIXELS];
        let images = Matrix::from_columns(&[vec![0.0; IMAGE_PIXELS], pixels.clone()]).unwrap();
        save_column_as_image(&images, 1, &path).unwrap();

        let reloaded = load_image_input(&path).unwrap();
        assert_eq!(reloaded.len(), IMAGE_PIXELS);
        for (a, b) in reloaded.iter().zip(&pixels) {
            assert!((a - b).abs() < 1.5 / 255.0);
        }
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let images = Matrix::zeros(IMAGE_PIXELS, 1);
        let err = save_column_as_image(&images, 1, dir.path().join("x.png")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(save_column_as_image(&Matrix::zeros(4, 1), 0, dir.path().join("y.png")).is_err());
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        assert!(matches!(image_bytes_to_input(b"not an image"), Err(Error::Image(_))));
    }
}
