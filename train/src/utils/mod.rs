//! Misc utilities.

mod checkpoint;
mod download;
mod environment;

pub use checkpoint::*;
pub use download::*;
pub use environment::*;
