//! Training program configuration format.
//!
//! Every field has a default value, so that an empty configuration file, or
//! no file at all, reproduces the standard KITTI road training setup.

use crate::common::*;

/// The main training configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let Self {
            dataset: DatasetConfig { image_shape, .. },
            model:
                ModelConfig {
                    num_classes,
                    mid_skip_scale,
                    shallow_skip_scale,
                    kernel_l2_scale,
                    reg_weight,
                    ..
                },
            training: TrainingConfig { keep_prob, lr, .. },
            ..
        } = self;

        ensure!(
            image_shape.iter().all(|&size| size > 0 && size % 32 == 0),
            "image_shape must be positive multiples of 32, but get {:?}",
            image_shape
        );
        ensure!(*num_classes >= 2, "num_classes must be at least 2");
        ensure!(
            [mid_skip_scale, shallow_skip_scale, kernel_l2_scale, reg_weight]
                .iter()
                .all(|value| value.raw() >= 0.0),
            "skip scales and regularization weights must be non-negative"
        );
        ensure!(
            *keep_prob > 0.0 && *keep_prob <= 1.0,
            "keep_prob must be in range (0, 1], but get {}",
            keep_prob
        );
        ensure!(*lr > 0.0, "lr must be positive, but get {}", lr);
        Ok(())
    }
}

/// Dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// The directory containing `data_road/` and `vgg/`.
    pub data_dir: PathBuf,
    /// Images are resized to `[height, width]`.
    pub image_shape: [usize; 2],
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            image_shape: [160, 576],
        }
    }
}

/// The model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub num_classes: usize,
    /// Where to fetch the VGG16 weights if `vgg/vgg16.ot` is absent in the data directory.
    pub vgg_url: String,
    pub mid_skip_scale: R64,
    pub shallow_skip_scale: R64,
    pub kernel_l2_scale: R64,
    pub reg_weight: R64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: 2,
            vgg_url: "https://github.com/LaurentMazare/tch-rs/releases/download/mw/vgg16.ot"
                .into(),
            mid_skip_scale: r64(0.01),
            shallow_skip_scale: r64(1e-4),
            kernel_l2_scale: r64(1e-3),
            reg_weight: r64(0.01),
        }
    }
}

/// The training options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub keep_prob: R64,
    pub lr: R64,
    #[serde(with = "tch_serde::serde_device")]
    pub device: Device,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: NonZeroUsize::new(40).unwrap(),
            batch_size: NonZeroUsize::new(15).unwrap(),
            keep_prob: r64(0.3),
            lr: r64(1e-4),
            device: Device::cuda_if_available(),
        }
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Each run creates a timestamped directory here.
    pub runs_dir: PathBuf,
    /// Write TensorBoard scalars to `events/` in the run directory.
    pub enable_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("runs"),
            enable_events: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() -> Result<()> {
        let config: Config = json5::from_str("{}")?;
        config.validate()?;

        assert_eq!(config.dataset.data_dir, Path::new("data"));
        assert_eq!(config.dataset.image_shape, [160, 576]);
        assert_eq!(config.model.num_classes, 2);
        assert_eq!(config.training.epochs.get(), 40);
        assert_eq!(config.training.batch_size.get(), 15);
        assert_eq!(config.training.keep_prob, r64(0.3));
        assert_eq!(config.training.lr, r64(1e-4));
        assert_eq!(config.logging.runs_dir, Path::new("runs"));
        Ok(())
    }

    #[test]
    fn partial_config_overrides_fields() -> Result<()> {
        let text = r#"{
            // train briefly on CPU
            training: { epochs: 2, device: "cpu" },
            logging: { enable_events: false },
        }"#;
        let config: Config = json5::from_str(text)?;
        config.validate()?;

        assert_eq!(config.training.epochs.get(), 2);
        assert_eq!(config.training.batch_size.get(), 15);
        assert_eq!(config.training.device, Device::Cpu);
        assert!(!config.logging.enable_events);
        Ok(())
    }

    #[test]
    fn reject_invalid_values() -> Result<()> {
        let cases = [
            "{ training: { keep_prob: 0.0 } }",
            "{ training: { lr: -1.0 } }",
            "{ dataset: { image_shape: [100, 576] } }",
            "{ model: { num_classes: 1 } }",
        ];
        for text in cases {
            let config: Config = json5::from_str(text)?;
            assert!(config.validate().is_err(), "'{}' is accepted", text);
        }
        assert!(json5::from_str::<Config>("{ training: { epochs: 0 } }").is_err());
        Ok(())
    }
}
