pub use anyhow::{ensure, format_err, Context as _, Result};
pub use itertools::Itertools as _;
pub use log::{info, warn};
pub use once_cell::sync::Lazy;
pub use rand::prelude::*;
pub use regex::Regex;
pub use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::Debug,
    path::{Path, PathBuf},
};
pub use tch::{
    nn::{self, OptimizerConfig},
    vision, Device, Kind, Reduction, Tensor,
};
pub use tch_modules::{Conv2DInit, ConvND, CrossEntropyLoss, L2Regularizer};
pub use tch_tensor_like::TensorLike;
