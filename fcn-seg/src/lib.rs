//! The building blocks of a fully convolutional road segmentation network.

mod common;
pub mod dataset;
pub mod inference;
pub mod loss;
pub mod model;
