//! Training progress reporting.

use crate::common::*;

/// A summary of a finished epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub loss: f64,
    pub elapsed: Duration,
    /// Estimated time for the remaining epochs.
    pub time_left: Duration,
}

/// Print training progress and optionally write TensorBoard scalars.
#[derive(Debug)]
pub struct TrainingLogger {
    event_writer: Option<EventWriter<BufWriter<File>>>,
    num_steps: usize,
    epoch_reports: Vec<EpochReport>,
}

impl TrainingLogger {
    /// Create a logger that only prints messages.
    pub fn new() -> Self {
        Self {
            event_writer: None,
            num_steps: 0,
            epoch_reports: vec![],
        }
    }

    /// Create a logger that also writes event files to `event_dir`.
    pub fn with_event_dir(event_dir: impl AsRef<Path>) -> Result<Self> {
        let event_dir = event_dir.as_ref();
        fs::create_dir_all(event_dir)?;

        let event_path_prefix = event_dir
            .join("fcn-seg")
            .into_os_string()
            .into_string()
            .map_err(|path| format_err!("non-UTF-8 event path '{:?}'", path))?;
        let event_writer =
            EventWriter::from_prefix(event_path_prefix, "", EventWriterConfig::default())?;

        Ok(Self {
            event_writer: Some(event_writer),
            ..Self::new()
        })
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn epoch_reports(&self) -> &[EpochReport] {
        &self.epoch_reports
    }

    /// Record the loss of a training step.
    pub fn log_step(&mut self, epoch: usize, loss: f64) -> Result<()> {
        let step = self.num_steps;
        self.num_steps += 1;

        if let Some(writer) = &mut self.event_writer {
            writer.write_scalar("train/loss/step", step as i64, loss as f32)?;
        }
        tracing::debug!("epoch: {}\tstep: {}\tloss: {:.5}", epoch, step, loss);
        Ok(())
    }

    /// Print the banner before the first progress line.
    pub fn log_banner(&self, epochs: usize, keep_prob: f64, lr: f64) {
        info!("Training. . .");
        info!(
            "Epochs: {} Dropout keep probability: {} Learning Rate: {}",
            epochs, keep_prob, lr
        );
    }

    /// Print the progress line of a finished epoch.
    ///
    /// The line shows the mean step loss over the epoch rather than the loss of
    /// the last batch, and numbers epochs from 1 while `report.epoch` is 0-based.
    pub fn log_epoch(&mut self, report: EpochReport, epochs: usize) -> Result<()> {
        let EpochReport {
            epoch,
            loss,
            elapsed,
            time_left,
        } = report;

        info!(
            "Loss: {:.4} at Epoch {}/{} in {:.2} seconds, time left: ~{:.2} minutes",
            loss,
            epoch + 1,
            epochs,
            elapsed.as_secs_f64(),
            time_left.as_secs_f64() / 60.0
        );

        if let Some(writer) = &mut self.event_writer {
            let step = epoch as i64;
            writer.write_scalar("train/loss/epoch", step, loss as f32)?;
            writer.write_scalar("train/time/epoch_secs", step, elapsed.as_secs_f32())?;
            writer.flush()?;
        }

        self.epoch_reports.push(report);
        Ok(())
    }
}

impl Default for TrainingLogger {
    fn default() -> Self {
        Self::new()
    }
}
