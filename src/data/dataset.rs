use std::path::Path;

use crate::data::idx::{load_idx1_labels, load_idx3_images};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Maps raw class ids to a `num_classes x n` matrix with a single 1 per
/// column, at the row given by the label.
pub fn labels_to_one_hot(labels: &[f64], num_classes: usize) -> Result<Matrix> {
    let mut one_hot = Matrix::zeros(num_classes, labels.len());
    for (j, &label) in labels.iter().enumerate() {
        if label.fract() != 0.0 || label < 0.0 || label >= num_classes as f64 {
            return Err(Error::Format(format!(
                "label {} at index {} is not a class id in [0, {})",
                label, j, num_classes
            )));
        }
        one_hot.data[label as usize][j] = 1.0;
    }
    Ok(one_hot)
}

/// Images (one flattened image per column) paired with their class ids.
#[derive(Debug, Clone)]
pub struct Dataset {
    images: Matrix,
    labels: Vec<f64>,
}

/// A mini-batch drawn from a `Dataset`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Matrix,
    pub labels: Vec<f64>,
    /// Dataset columns the batch was drawn from, in batch order.
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Dataset {
    pub fn new(images: Matrix, labels: Vec<f64>) -> Result<Dataset> {
        if images.cols != labels.len() {
            return Err(Error::Shape(format!(
                "{} images but {} labels",
                images.cols,
                labels.len()
            )));
        }
        Ok(Dataset { images, labels })
    }

    /// Loads an IDX3 image file and its IDX1 label file.
    pub fn load_idx<P: AsRef<Path>, Q: AsRef<Path>>(images_path: P, labels_path: Q) -> Result<Dataset> {
        Dataset::new(load_idx3_images(images_path)?, load_idx1_labels(labels_path)?)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.images.rows
    }

    pub fn images(&self) -> &Matrix {
        &self.images
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Copies the given samples into a batch.
    pub fn batch(&self, indices: &[usize]) -> Result<Batch> {
        let images = self.images.select_columns(indices)?;
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Ok(Batch {
            images,
            labels,
            indices: indices.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_sets_the_label_row() {
        let one_hot = labels_to_one_hot(&[2.0, 0.0], 3).unwrap();
        assert_eq!(one_hot.column(0), vec![0.0, 0.0, 1.0]);
        assert_eq!(one_hot.column(1), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn one_hot_rejects_out_of_range_labels() {
        assert!(matches!(labels_to_one_hot(&[10.0], 10), Err(Error::Format(_))));
        assert!(labels_to_one_hot(&[-1.0], 10).is_err());
        assert!(labels_to_one_hot(&[1.5], 10).is_err());
    }

    #[test]
    fn dataset_checks_counts_and_builds_batches() {
        let images = Matrix::from_columns(&[vec![0.0, 0.1], vec![1.0, 1.1], vec![2.0, 2.1]]).unwrap();
        assert!(Dataset::new(images.clone(), vec![0.0, 1.0]).is_err());

        let dataset = Dataset::new(images, vec![4.0, 5.0, 6.0]).unwrap();
        let batch = dataset.batch(&[2, 0]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.labels, vec![6.0, 4.0]);
        assert_eq!(batch.images.column(0), vec![2.0, 2.1]);
        assert!(dataset.batch(&[3]).is_err());
    }
}
