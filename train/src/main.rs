use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::Arc};
use structopt::StructOpt;
use tracing::info_span;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use train::config::Config;

#[derive(Debug, Clone, StructOpt)]
/// Train the FCN road segmentation model on KITTI road dataset
struct Args {
    #[structopt(long)]
    /// configuration file, built-in defaults are used if absent
    pub config_file: Option<PathBuf>,
}

pub fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse arguments
    let Args { config_file } = Args::from_args();
    let config = match config_file {
        Some(config_file) => Config::open(&config_file).with_context(|| {
            format!("failed to load config file '{}'", config_file.display())
        })?,
        None => Config::default(),
    };

    // start training program
    let _span = info_span!("train").entered();
    train::start(Arc::new(config))?;

    Ok(())
}
