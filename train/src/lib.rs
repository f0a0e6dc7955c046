//! The training program for the FCN road segmentation model.

pub mod common;
pub mod config;
pub mod logging;
pub mod train;
pub mod utils;

use crate::{
    common::*,
    config::{Config, DatasetConfig, LoggingConfig, ModelConfig, TrainingConfig},
    logging::TrainingLogger,
    train::{TrainingContext, TrainingHyperParams},
};
use fcn_seg::{
    dataset::{check_kitti_dataset, kitti_testing_dir, kitti_training_dir, KittiRoadDataset},
    inference::save_inference_samples,
    loss::ObjectiveInit,
    model::{DecoderInit, Vgg16Init},
};

/// The entry of training program.
///
/// The dataset layout is verified before anything is written or allocated.
pub fn start(config: Arc<Config>) -> Result<()> {
    let start_time = Local::now();
    config.validate()?;

    let Config {
        dataset:
            DatasetConfig {
                ref data_dir,
                image_shape,
            },
        model:
            ModelConfig {
                num_classes,
                ref vgg_url,
                mid_skip_scale,
                shallow_skip_scale,
                kernel_l2_scale,
                reg_weight,
            },
        training:
            TrainingConfig {
                epochs,
                batch_size,
                keep_prob,
                lr,
                device,
            },
        logging:
            LoggingConfig {
                ref runs_dir,
                enable_events,
            },
    } = *config;

    utils::check_environment();
    check_kitti_dataset(data_dir)?;
    let vgg_path = utils::maybe_download_pretrained_vgg(data_dir, vgg_url)?;

    // create dirs and save config
    let run_dir = runs_dir.join(format!("{}", start_time.format(utils::FILE_STRFTIME)));
    {
        fs::create_dir_all(&run_dir)?;
        let path = run_dir.join("config.json");
        let text = serde_json::to_string_pretty(&*config)?;
        fs::write(&path, text)?;
        info!("save run files to '{}'", run_dir.display());
    }

    let mut logger = if enable_events {
        TrainingLogger::with_event_dir(run_dir.join("events"))?
    } else {
        TrainingLogger::new()
    };

    // load dataset
    info!("loading dataset");
    let mut dataset = KittiRoadDataset::load(kitti_training_dir(data_dir), image_shape)?;
    ensure!(
        dataset.num_classes() == num_classes,
        "the dataset has {} classes, but the model is configured with {}",
        dataset.num_classes(),
        num_classes
    );

    // init model
    info!("initializing model on {:?}", device);
    let mut ctx = TrainingContext::new(
        nn::VarStore::new(device),
        |path| Vgg16Init::default().build(path),
        DecoderInit {
            num_classes,
            mid_skip_scale: mid_skip_scale.raw(),
            shallow_skip_scale: shallow_skip_scale.raw(),
            kernel_l2_scale: kernel_l2_scale.raw(),
        },
        ObjectiveInit {
            num_classes,
            reg_weight: reg_weight.raw(),
        },
        lr.raw(),
    )?;
    ctx.model.backbone().load_pretrained(&vgg_path)?;

    // training
    let hparams = TrainingHyperParams {
        epochs: epochs.get(),
        batch_size: batch_size.get(),
        keep_prob: keep_prob.raw(),
        lr: lr.raw(),
    };
    train::train_nn(&mut ctx, &hparams, &mut dataset, &mut logger)?;

    // inference
    info!("Saving inference samples. . .");
    save_inference_samples(
        &ctx.model,
        kitti_testing_dir(data_dir).join("image_2"),
        run_dir.join("samples"),
        image_shape,
        device,
    )?;

    // save checkpoint
    let loss = ctx
        .last_loss
        .ok_or_else(|| format_err!("no training step was run"))?;
    let checkpoint = utils::save_checkpoint(&ctx.vs, &run_dir.join("checkpoints"), ctx.step, loss)?;
    info!("saved checkpoint '{}'", checkpoint.display());

    Ok(())
}
