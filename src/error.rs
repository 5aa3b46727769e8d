use thiserror::Error;

/// Errors raised by tensor operations, layers, losses, the optimizer and the
/// training loop.
///
/// Every variant is a contract violation reported synchronously to the caller;
/// nothing in the crate retries or skips on error.
#[derive(Debug, Error)]
pub enum NnError {
    /// Operand shapes are incompatible for an operation.
    #[error("shape error in {op}: {detail}")]
    Shape { op: &'static str, detail: String },

    /// `backward()` was requested on a tensor that is not rank 0.
    #[error("backward requires a rank-0 tensor, got shape {shape:?}")]
    NonScalarBackward { shape: Vec<usize> },

    /// A class label lies outside `[0, classes)`.
    #[error("label {label} at row {row} is out of range for {classes} classes")]
    Index { row: usize, label: usize, classes: usize },

    /// An operand was recorded on a different tape than the operation.
    #[error("tensor belongs to a different tape")]
    ForeignTensor,

    /// The optimizer outlived the model that owned its parameters.
    #[error("parameter was released before the optimizer used it")]
    ParameterReleased,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A training step failed; carries the position of the offending batch.
    #[error("training failed at epoch {epoch}, batch {batch}")]
    Batch {
        epoch: usize,
        batch: usize,
        #[source]
        source: Box<NnError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NnError>;

impl NnError {
    pub(crate) fn shape(op: &'static str, detail: impl Into<String>) -> Self {
        NnError::Shape { op, detail: detail.into() }
    }

    /// True for shape-class errors, looking through `Batch` wrappers.
    pub fn is_shape_error(&self) -> bool {
        match self {
            NnError::Shape { .. } | NnError::NonScalarBackward { .. } => true,
            NnError::Batch { source, .. } => source.is_shape_error(),
            _ => false,
        }
    }

    /// True for label-range errors, looking through `Batch` wrappers.
    pub fn is_index_error(&self) -> bool {
        match self {
            NnError::Index { .. } => true,
            NnError::Batch { source, .. } => source.is_index_error(),
            _ => false,
        }
    }
}
