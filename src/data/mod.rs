pub mod batch;
pub mod dataset;
pub mod synthetic;

pub use batch::{Batch, BatchSource};
pub use dataset::InMemoryDataset;
pub use synthetic::separable_blobs;
