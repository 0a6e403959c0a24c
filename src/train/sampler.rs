use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::data::dataset::{Batch, Dataset};
use crate::error::{Error, Result};

/// Endless source of equally sized mini-batches.
///
/// Each epoch shuffles `[0, n)` and carves batches from the permutation in
/// order. When fewer than `batch_size` indices are left they are dropped and
/// the next epoch starts with a fresh shuffle, so every batch is full and no
/// index repeats within an epoch. `next` never returns `None`; the caller
/// decides when to stop.
pub struct BatchSampler<'a, R: Rng> {
    dataset: &'a Dataset,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    rng: R,
}

impl<'a, R: Rng> BatchSampler<'a, R> {
    pub fn new(dataset: &'a Dataset, batch_size: usize, rng: R) -> Result<BatchSampler<'a, R>> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_owned()));
        }
        if batch_size > dataset.len() {
            return Err(Error::Config(format!(
                "requested batch size of {} exceeds the dataset size of {}",
                batch_size,
                dataset.len()
            )));
        }

        let mut sampler = BatchSampler {
            dataset,
            batch_size,
            order: (0..dataset.len()).collect(),
            cursor: 0,
            epoch: 0,
            rng,
        };
        sampler.order.shuffle(&mut sampler.rng);
        Ok(sampler)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Zero-based index of the epoch the next batch comes from.
    pub fn epoch(&self) -> usize {
        if self.cursor + self.batch_size > self.order.len() {
            self.epoch + 1
        } else {
            self.epoch
        }
    }

    /// Dataset indices of the next batch.
    pub fn next_indices(&mut self) -> Vec<usize> {
        if self.cursor + self.batch_size > self.order.len() {
            debug!(
                epoch = self.epoch,
                discarded = self.order.len() - self.cursor,
                "epoch finished, reshuffling"
            );
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
            self.epoch += 1;
        }
        let indices = self.order[self.cursor..self.cursor + self.batch_size].to_vec();
        self.cursor += self.batch_size;
        indices
    }

    pub fn next_batch(&mut self) -> Result<Batch> {
        let indices = self.next_indices();
        self.dataset.batch(&indices)
    }
}

impl<'a, R: Rng> Iterator for BatchSampler<'a, R> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let indices = self.next_indices();
        // Indices come from `0..dataset.len()`, so selecting them cannot fail.
        self.dataset.batch(&indices).ok()
    }
}
