pub mod dense;
pub mod layer;

pub use dense::{Init, Linear};
pub use layer::Layer;
