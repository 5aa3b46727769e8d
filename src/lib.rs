pub mod error;
pub mod math;
pub mod autograd;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod train;

// Convenience re-exports
pub use error::{NnError, Result};
pub use math::array::NdArray;
pub use autograd::{NoGradGuard, OpKind, Parameter, Tape, Tensor};
pub use activation::activation::ActivationFunction;
pub use layers::{Init, Layer, Linear};
pub use network::{LayerSpec, Network, NetworkSpec};
pub use loss::{CrossEntropyLoss, LossType, NllLoss, Reduction};
pub use optim::sgd::Sgd;
pub use data::{Batch, BatchSource, InMemoryDataset};
pub use train::{evaluate, train_loop, EpochStats, TrainConfig, TrainReport};
