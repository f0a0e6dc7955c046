//! Dataset loading and batching.

mod batch;
mod kitti;

pub use batch::*;
pub use kitti::*;
