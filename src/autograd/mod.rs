mod backward;
pub mod grad_mode;
pub mod ops;
pub mod parameter;
pub mod tape;
pub mod tensor;

pub use grad_mode::NoGradGuard;
pub use ops::OpKind;
pub use parameter::{Parameter, WeakParameter};
pub use tape::{NodeId, Tape};
pub use tensor::Tensor;
