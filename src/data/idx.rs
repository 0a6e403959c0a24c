//! IDX binary files as shipped with MNIST.
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-3:   magic 2051 (0x00000803, big-endian)
//! bytes  4-7:   N           (number of images)
//! bytes  8-11:  rows        (image height in pixels)
//! bytes 12-15:  cols        (image width in pixels)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-3:   magic 2049 (0x00000801, big-endian)
//! bytes  4-7:   N           (number of labels)
//! bytes  8..:   N bytes, each a class index
//! ```
use std::path::Path;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

pub const IMAGE_MAGIC: u32 = 2051;
pub const LABEL_MAGIC: u32 = 2049;

/// Parses an IDX3 image file into a `(rows * cols) x N` matrix, one image
/// per column, with pixels scaled from `[0, 255]` to `[0, 1]`.
pub fn parse_idx3_images(bytes: &[u8]) -> Result<Matrix> {
    if bytes.len() < 16 {
        return Err(Error::Format(format!(
            "IDX image file too short: expected at least 16 header bytes, got {}",
            bytes.len()
        )));
    }

    let magic = read_be_u32(bytes, 0);
    if magic != IMAGE_MAGIC {
        return Err(Error::Format(format!(
            "invalid magic number in image file: expected {}, got {}",
            IMAGE_MAGIC, magic
        )));
    }

    let n_items = read_be_u32(bytes, 4) as usize;
    let rows = read_be_u32(bytes, 8) as usize;
    let cols = read_be_u32(bytes, 12) as usize;

    let n_pixels = rows.checked_mul(cols).ok_or_else(|| {
        Error::Format(format!("IDX image file: rows * cols overflows (rows={}, cols={})", rows, cols))
    })?;
    let data_len = n_items.checked_mul(n_pixels).ok_or_else(|| {
        Error::Format(format!(
            "IDX image file: n_items * n_pixels overflows (n_items={}, n_pixels={})",
            n_items, n_pixels
        ))
    })?;

    let data = &bytes[16..];
    if data.len() < data_len {
        return Err(Error::Format(format!(
            "IDX image file too short: header declares {} images of {}x{} pixels \
             ({} data bytes) but only {} follow the header",
            n_items,
            rows,
            cols,
            data_len,
            data.len()
        )));
    }

    let mut images = Matrix::zeros(n_pixels, n_items);
    if n_pixels > 0 {
        for (j, image) in data[..data_len].chunks_exact(n_pixels).enumerate() {
            for (i, &px) in image.iter().enumerate() {
                images.data[i][j] = px as f64 / 255.0;
            }
        }
    }
    Ok(images)
}

/// Parses an IDX1 label file. Labels are raw class ids stored as `f64`.
pub fn parse_idx1_labels(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() < 8 {
        return Err(Error::Format(format!(
            "IDX label file too short: expected at least 8 header bytes, got {}",
            bytes.len()
        )));
    }

    let magic = read_be_u32(bytes, 0);
    if magic != LABEL_MAGIC {
        return Err(Error::Format(format!(
            "invalid magic number in label file: expected {}, got {}",
            LABEL_MAGIC, magic
        )));
    }

    let n_items = read_be_u32(bytes, 4) as usize;
    let data = &bytes[8..];
    if data.len() < n_items {
        return Err(Error::Format(format!(
            "IDX label file too short: header declares {} labels but only {} follow the header",
            n_items,
            data.len()
        )));
    }

    Ok(data[..n_items].iter().map(|&label| label as f64).collect())
}

pub fn load_idx3_images<P: AsRef<Path>>(path: P) -> Result<Matrix> {
    parse_idx3_images(&std::fs::read(path)?)
}

pub fn load_idx1_labels<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    parse_idx1_labels(&std::fs::read(path)?)
}

fn read_be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
