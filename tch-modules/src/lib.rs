//! Reusable tch layers and loss functions for dense prediction models.

mod common;
pub mod conv_nd;
pub mod cross_entropy;
pub mod l2_regularizer;

pub use conv_nd::*;
pub use cross_entropy::*;
pub use l2_regularizer::*;
