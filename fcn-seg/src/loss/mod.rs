//! Training objective and optimizer.

mod objective;
mod optimizer;

pub use objective::*;
pub use optimizer::*;
