use crate::math::array::NdArray;

/// One mini-batch: inputs of shape (batch × features) and one class label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: NdArray,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn new(inputs: NdArray, labels: Vec<usize>) -> Batch {
        Batch { inputs, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A finite stream of batches that can be replayed once per epoch.
///
/// `batches` is called at the start of every epoch and must yield the whole
/// data set lazily. Shape problems inside a batch are not checked here; the
/// training step rejects them.
pub trait BatchSource {
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_>;
}

/// Replays the same batches, in order, every epoch.
impl BatchSource for Vec<Batch> {
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_> {
        Box::new(self.iter().cloned())
    }
}
