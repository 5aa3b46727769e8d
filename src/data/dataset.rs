use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::batch::{Batch, BatchSource};
use crate::error::{NnError, Result};
use crate::math::array::NdArray;

/// Samples held in memory, cut into mini-batches each epoch.
///
/// With shuffling enabled the sample order is redrawn every epoch from a
/// seeded generator, so runs are reproducible.
#[derive(Debug)]
pub struct InMemoryDataset {
    inputs: Vec<Vec<f64>>,
    labels: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl InMemoryDataset {
    /// # Errors
    /// Fails if the data set is empty, lengths differ, rows have different
    /// widths, or `batch_size == 0`.
    pub fn new(inputs: Vec<Vec<f64>>, labels: Vec<usize>, batch_size: usize) -> Result<InMemoryDataset> {
        if inputs.is_empty() {
            return Err(NnError::InvalidConfig("data set is empty".to_string()));
        }
        if inputs.len() != labels.len() {
            return Err(NnError::InvalidConfig(format!(
                "{} samples but {} labels",
                inputs.len(),
                labels.len()
            )));
        }
        if batch_size == 0 {
            return Err(NnError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        let width = inputs[0].len();
        if let Some(i) = inputs.iter().position(|row| row.len() != width) {
            return Err(NnError::shape(
                "dataset",
                format!("sample {} has {} features, expected {}", i, inputs[i].len(), width),
            ));
        }
        Ok(InMemoryDataset {
            inputs,
            labels,
            batch_size,
            shuffle: false,
            rng: StdRng::from_entropy(),
        })
    }

    /// Reshuffles every epoch using a generator seeded with `seed`.
    pub fn shuffled(mut self, seed: u64) -> InMemoryDataset {
        self.shuffle = true;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The whole data set as a single batch, in storage order.
    pub fn full_batch(&self) -> Result<Batch> {
        Ok(Batch::new(NdArray::from_rows(&self.inputs)?, self.labels.clone()))
    }
}

impl BatchSource for InMemoryDataset {
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_> {
        let mut order: Vec<usize> = (0..self.inputs.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let inputs = &self.inputs;
        let labels = &self.labels;
        let width = inputs[0].len();
        let chunks: Vec<Vec<usize>> = order.chunks(self.batch_size).map(<[usize]>::to_vec).collect();

        Box::new(chunks.into_iter().map(move |idx| {
            // Rows were checked for equal width in `new`.
            let mut batch_inputs = NdArray::zeros(&[idx.len(), width]);
            for (dst, &i) in batch_inputs.data_mut().chunks_mut(width.max(1)).zip(&idx) {
                dst.copy_from_slice(&inputs[i]);
            }
            let batch_labels = idx.iter().map(|&i| labels[i]).collect();
            Batch::new(batch_inputs, batch_labels)
        }))
    }
}
