//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use chrono::{DateTime, Local};
pub use fcn_seg::{
    dataset::{Batch, BatchGenerator},
    loss::{Objective, ObjectiveOutput},
    model::{Backbone, FcnModel},
};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt::Debug,
    fs::{self, File},
    io::{BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{nn, Device, Kind, Tensor};
pub use tch_tensor_like::TensorLike;
pub use tfrecord::{EventWriter, EventWriterConfig};
pub use tracing::{info, info_span, warn};
