//! The training loop.

use crate::{
    common::*,
    logging::{EpochReport, TrainingLogger},
};
use fcn_seg::{
    loss::{AdamInit, ObjectiveInit},
    model::DecoderInit,
};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingHyperParams {
    pub epochs: usize,
    pub batch_size: usize,
    /// The probability to keep an activation in dropout layers.
    pub keep_prob: f64,
    pub lr: f64,
}

impl Default for TrainingHyperParams {
    fn default() -> Self {
        Self {
            epochs: 40,
            batch_size: 15,
            keep_prob: 0.3,
            lr: 1e-4,
        }
    }
}

/// The model, objective and optimizer together with the variables they share.
#[derive(Debug)]
pub struct TrainingContext<B>
where
    B: Backbone,
{
    pub vs: nn::VarStore,
    pub model: FcnModel<B>,
    pub objective: Objective,
    pub optimizer: nn::Optimizer,
    pub device: Device,
    /// The number of optimization steps done so far.
    pub step: usize,
    /// The average loss of the latest epoch.
    pub last_loss: Option<f64>,
}

impl<B> TrainingContext<B>
where
    B: Backbone,
{
    /// Build the model on a backbone and the objective for `num_classes`.
    ///
    /// `build_backbone` creates the backbone variables under the given path.
    /// The optimizer is created after all variables exist, so it updates every one of them.
    pub fn new<F>(
        vs: nn::VarStore,
        build_backbone: F,
        decoder_init: DecoderInit,
        objective_init: ObjectiveInit,
        lr: f64,
    ) -> Result<Self>
    where
        F: FnOnce(&nn::Path) -> Result<B>,
    {
        ensure!(
            decoder_init.num_classes == objective_init.num_classes,
            "the decoder has {} classes but the objective has {}",
            decoder_init.num_classes,
            objective_init.num_classes
        );

        let device = vs.device();
        let root = vs.root();
        let backbone = build_backbone(&(&root / "backbone"))?;
        let model = FcnModel::new(&root / "decoder", backbone, decoder_init)?;
        let objective = objective_init.build()?;
        let optimizer = AdamInit::default().build(&vs, lr)?;

        Ok(Self {
            vs,
            model,
            objective,
            optimizer,
            device,
            step: 0,
            last_loss: None,
        })
    }
}

/// Train the model for the given number of epochs.
///
/// Each epoch consumes a fresh pass of `batch_generator`. An error from the
/// generator or from any step aborts the run.
pub fn train_nn<B, G>(
    ctx: &mut TrainingContext<B>,
    hparams: &TrainingHyperParams,
    batch_generator: &mut G,
    logger: &mut TrainingLogger,
) -> Result<()>
where
    B: Backbone,
    G: BatchGenerator + ?Sized,
{
    let TrainingHyperParams {
        epochs,
        batch_size,
        keep_prob,
        lr,
    } = *hparams;
    ensure!(epochs > 0, "epochs must be positive");
    ensure!(batch_size > 0, "batch_size must be positive");
    ensure!(
        keep_prob > 0.0 && keep_prob <= 1.0,
        "keep_prob must be in range (0, 1], but get {}",
        keep_prob
    );
    ensure!(lr > 0.0, "lr must be positive, but get {}", lr);

    let TrainingContext {
        model,
        objective,
        optimizer,
        device,
        step,
        last_loss,
        ..
    } = ctx;
    let device = *device;
    let mut total_time = Duration::ZERO;

    for epoch in 0..epochs {
        let _span = info_span!("epoch", epoch).entered();
        let start = Instant::now();
        let mut loss_sum = 0.0;
        let mut num_batches = 0;

        for batch in batch_generator.batches(batch_size)? {
            let Batch { image, label } = batch?.to_device(device);

            optimizer.set_lr(lr);
            let output = model.forward_t(&image, keep_prob, true)?;
            let ObjectiveOutput { total_loss, .. } =
                objective.forward(&output, &label, &model.regularization_loss())?;
            optimizer.backward_step(&total_loss);

            let loss = f64::from(&total_loss);
            ensure!(
                loss.is_finite(),
                "the loss becomes {} at step {}",
                loss,
                step
            );
            logger.log_step(epoch, loss)?;
            loss_sum += loss;
            num_batches += 1;
            *step += 1;
        }

        ensure!(
            num_batches > 0,
            "the batch generator yields no batches at epoch {}",
            epoch
        );

        let elapsed = start.elapsed();
        total_time += elapsed;
        let average = total_time / (epoch as u32 + 1);
        let time_left = average * (epochs - epoch - 1) as u32;
        let loss = loss_sum / num_batches as f64;
        *last_loss = Some(loss);

        if epoch == 0 {
            logger.log_banner(epochs, keep_prob, lr);
        }
        logger.log_epoch(
            EpochReport {
                epoch,
                loss,
                elapsed,
                time_left,
            },
            epochs,
        )?;
    }

    Ok(())
}
