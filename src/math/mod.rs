pub mod array;

pub use array::NdArray;
