use serde::{Deserialize, Serialize};

/// Per-epoch training statistics emitted by `train_loop`.
///
/// One value is logged and, when a `progress_tx` channel is configured in
/// `TrainConfig`, sent at the end of every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Running average of the batch losses over this epoch.
    pub train_loss: f64,
    /// Fraction of training samples classified correctly during the epoch's
    /// forward passes, in [0, 1].
    pub train_accuracy: f64,
    pub batches: usize,
    pub samples: usize,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
