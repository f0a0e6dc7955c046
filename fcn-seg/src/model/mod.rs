//! Model architectures.

mod backbone;
mod decoder;
mod fcn;
mod vgg16;

pub use backbone::*;
pub use decoder::*;
pub use fcn::*;
pub use vgg16::*;
