pub use anyhow::{bail, ensure, Result};
pub use std::borrow::Borrow;
pub use tch::{nn, Device, Kind, Reduction, Tensor};
