pub mod cross_entropy;
pub mod loss_type;
pub mod nll;
pub mod reduction;

pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossType;
pub use nll::NllLoss;
pub use reduction::Reduction;
