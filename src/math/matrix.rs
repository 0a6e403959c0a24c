use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Dense row-major matrix. Batches store one sample per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    /// Builds a matrix from row vectors. All rows must have the same length.
    pub fn from_rows(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = data.first().map_or(0, |row| row.len());
        if let Some((i, row)) = data.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(Error::Shape(format!(
                "row {} has length {}, expected {}",
                i,
                row.len(),
                cols
            )));
        }
        Ok(Matrix {
            rows: data.len(),
            cols,
            data,
        })
    }

    /// Builds a matrix whose j-th column is `columns[j]`.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Matrix> {
        let rows = columns.first().map_or(0, |col| col.len());
        let mut res = Matrix::zeros(rows, columns.len());
        for (j, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(Error::Shape(format!(
                    "column {} has length {}, expected {}",
                    j,
                    column.len(),
                    rows
                )));
            }
            for (i, &value) in column.iter().enumerate() {
                res.data[i][j] = value;
            }
        }
        Ok(res)
    }

    /// A single-column matrix holding `values`.
    pub fn column_vector(values: &[f64]) -> Matrix {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.iter().map(|&v| vec![v]).collect(),
        }
    }

    /// Samples every entry from N(mean, std_dev).
    pub fn random_normal<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        mean: f64,
        std_dev: f64,
        rng: &mut R,
    ) -> Result<Matrix> {
        let normal = Normal::new(mean, std_dev).map_err(|e| {
            Error::Config(format!("invalid normal distribution N({}, {}): {}", mean, std_dev, e))
        })?;
        let data = (0..rows)
            .map(|_| (0..cols).map(|_| normal.sample(rng)).collect())
            .collect();
        Ok(Matrix { rows, cols, data })
    }

    /// He initialization: samples from N(0, sqrt(2 / cols)).
    ///
    /// `cols` is the fan-in. The variance 2/fan_in compensates for ReLU
    /// zeroing roughly half of its inputs.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        if cols == 0 {
            return Err(Error::Config("He initialization needs a fan-in of at least 1".to_owned()));
        }
        let std_dev = (2.0 / cols as f64).sqrt();
        Matrix::random_normal(rows, cols, 0.0, std_dev, rng)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Checks that `data` actually matches `rows` x `cols`. Only needed for
    /// matrices that came from outside, e.g. a deserialized model.
    pub fn validate(&self) -> Result<()> {
        if self.data.len() != self.rows {
            return Err(Error::Shape(format!(
                "matrix declares {} rows but holds {}",
                self.rows,
                self.data.len()
            )));
        }
        if let Some((i, row)) = self.data.iter().enumerate().find(|(_, row)| row.len() != self.cols) {
            return Err(Error::Shape(format!(
                "matrix row {} holds {} values, expected {}",
                i,
                row.len(),
                self.cols
            )));
        }
        Ok(())
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    /// Matrix product `self · rhs`.
    pub fn dot(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(Error::Shape(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..self.rows {
            let out_row = &mut res.data[i];
            for (k, &a) in self.data[i].iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                for (out, &b) in out_row.iter_mut().zip(rhs.data[k].iter()) {
                    *out += a * b;
                }
            }
        }

        Ok(res)
    }

    pub fn add(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "add", |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "subtract", |a, b| a - b)
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, rhs: &Matrix) -> Result<Matrix> {
        self.zip_with(rhs, "multiply element-wise", |a, b| a * b)
    }

    /// Adds `values[r]` to every entry of row `r`, i.e. adds the vector to
    /// each column independently.
    pub fn add_column_broadcast(&self, values: &[f64]) -> Result<Matrix> {
        if values.len() != self.rows {
            return Err(Error::Shape(format!(
                "cannot broadcast a vector of length {} over a {}x{} matrix",
                values.len(),
                self.rows,
                self.cols
            )));
        }
        let data = self
            .data
            .iter()
            .zip(values.iter())
            .map(|(row, &v)| row.iter().map(|&x| x + v).collect())
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Sum of every row, one value per row.
    pub fn row_sums(&self) -> Vec<f64> {
        self.data.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.data.iter().map(|row| row[j]).collect()
    }

    /// New matrix made of the given columns, in the given order.
    pub fn select_columns(&self, indices: &[usize]) -> Result<Matrix> {
        if let Some(&bad) = indices.iter().find(|&&j| j >= self.cols) {
            return Err(Error::Shape(format!(
                "column index {} out of range for a matrix with {} columns",
                bad, self.cols
            )));
        }
        let data = self
            .data
            .iter()
            .map(|row| indices.iter().map(|&j| row[j]).collect())
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: indices.len(),
            data,
        })
    }

    fn zip_with<F>(&self, rhs: &Matrix, op: &str, f: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape() != rhs.shape() {
            return Err(Error::Shape(format!(
                "cannot {} {}x{} and {}x{}",
                op, self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        let data = self
            .data
            .iter()
            .zip(rhs.data.iter())
            .map(|(row_a, row_b)| row_a.iter().zip(row_b.iter()).map(|(&a, &b)| f(a, b)).collect())
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}
