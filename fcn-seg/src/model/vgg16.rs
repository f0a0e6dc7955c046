//! The VGG16 encoder with fully connected layers converted to convolutions.

use super::backbone::{check_keep_prob, Backbone, FeatureChannels, FeatureMaps};
use crate::common::*;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output channels of convolutions per block.
const BLOCKS: [&[usize]; 5] = [
    &[64, 64],
    &[128, 128],
    &[256, 256, 256],
    &[512, 512, 512],
    &[512, 512, 512],
];
const FC_CHANNELS: usize = 4096;
const FC6_KSIZE: usize = 7;

/// VGG16 encoder initializer.
#[derive(Debug, Clone)]
pub struct Vgg16Init {
    pub input_channels: usize,
}

impl Default for Vgg16Init {
    fn default() -> Self {
        Self { input_channels: 3 }
    }
}

impl Vgg16Init {
    pub fn build<'p>(self, path: impl Borrow<nn::Path<'p>>) -> Result<Vgg16> {
        let Self { input_channels } = self;
        ensure!(
            input_channels == 3,
            "input_channels other than 3 is not supported"
        );

        let path = path.borrow();
        let features_path = path / "features";
        let classifier_path = path / "classifier";

        // follow the torchvision layer numbering, where each convolution is
        // followed by a ReLU and each block ends with a max-pooling layer
        let mut layer_index = 0;
        let mut in_c = input_channels;
        let mut params = PretrainedParams::default();

        let blocks: Vec<Vec<ConvND>> = BLOCKS
            .iter()
            .map(|channels| -> Result<_> {
                let convs: Vec<_> = channels
                    .iter()
                    .map(|&out_c| -> Result<_> {
                        let name = format!("features.{}", layer_index);
                        let conv = Conv2DInit::new(3).build(
                            &features_path / layer_index,
                            in_c,
                            out_c,
                        )?;
                        params.push_conv(&name, &conv);

                        layer_index += 2;
                        in_c = out_c;
                        Ok(conv)
                    })
                    .try_collect()?;
                layer_index += 1;
                Ok(convs)
            })
            .try_collect()?;

        // fc6 and fc7 of the classifier, in the form of convolutions
        let fc6 = Conv2DInit::new(FC6_KSIZE).build(&classifier_path / 0, in_c, FC_CHANNELS)?;
        params.push_conv("classifier.0", &fc6);
        let fc7 = Conv2DInit::new(1).build(&classifier_path / 3, FC_CHANNELS, FC_CHANNELS)?;
        params.push_conv("classifier.3", &fc7);

        Ok(Vgg16 {
            blocks,
            fc6,
            fc7,
            params,
        })
    }
}

/// Variables to be restored from a pretrained archive, keyed by archive names.
#[derive(Debug, Default)]
struct PretrainedParams {
    params: Vec<(String, Tensor)>,
}

impl PretrainedParams {
    fn push_conv(&mut self, prefix: &str, conv: &ConvND) {
        self.params.push((
            format!("{}.weight", prefix),
            conv.weight().shallow_clone(),
        ));
        if let Some(bias) = conv.bias() {
            self.params
                .push((format!("{}.bias", prefix), bias.shallow_clone()));
        }
    }

    /// Copy matching tensors from the archive to variables, reshaping them if necessary.
    fn load(&self, weights_file: &Path) -> Result<usize> {
        ensure!(
            weights_file.is_file(),
            "pretrained weights file '{}' does not exist",
            weights_file.display()
        );

        let tensors: HashMap<String, Tensor> = Tensor::load_multi(weights_file)
            .with_context(|| {
                format!(
                    "unable to load pretrained weights from '{}'",
                    weights_file.display()
                )
            })?
            .into_iter()
            .collect();

        tch::no_grad(|| {
            self.params.iter().try_for_each(|(name, var)| -> Result<_> {
                let src = tensors.get(name).ok_or_else(|| {
                    format_err!(
                        "tensor '{}' is missing in '{}'",
                        name,
                        weights_file.display()
                    )
                })?;
                ensure!(
                    src.numel() == var.numel(),
                    "tensor '{}' has shape {:?}, which cannot be reshaped to {:?}",
                    name,
                    src.size(),
                    var.size()
                );
                let mut var = var.shallow_clone();
                var.copy_(&src.reshape(var.size().as_slice()).to_device(var.device()));
                Ok(())
            })
        })?;

        Ok(self.params.len())
    }
}

/// The VGG16 encoder.
#[derive(Debug)]
pub struct Vgg16 {
    blocks: Vec<Vec<ConvND>>,
    fc6: ConvND,
    fc7: ConvND,
    params: PretrainedParams,
}

impl Vgg16 {
    /// Restore ImageNet pretrained weights from a tch/PyTorch `.ot` archive.
    ///
    /// The archive follows the torchvision naming, e.g. `features.0.weight` and
    /// `classifier.0.weight`. The weights of fully connected layers are reshaped
    /// to convolution kernels. The classification head is ignored.
    pub fn load_pretrained(&self, weights_file: impl AsRef<Path>) -> Result<()> {
        let weights_file = weights_file.as_ref();
        let count = self.params.load(weights_file)?;
        info!(
            "loaded {} pretrained tensors from '{}'",
            count,
            weights_file.display()
        );
        Ok(())
    }

    fn normalize(input: &Tensor) -> Tensor {
        let device = input.device();
        let mean = Tensor::of_slice(&IMAGENET_MEAN)
            .to_device(device)
            .view([1, 3, 1, 1]);
        let std = Tensor::of_slice(&IMAGENET_STD)
            .to_device(device)
            .view([1, 3, 1, 1]);
        (input - mean) / std
    }
}

impl Backbone for Vgg16 {
    fn channels(&self) -> FeatureChannels {
        FeatureChannels {
            shallow: BLOCKS[2][BLOCKS[2].len() - 1],
            mid: BLOCKS[3][BLOCKS[3].len() - 1],
            deep: FC_CHANNELS,
        }
    }

    fn forward_t(&self, input: &Tensor, keep_prob: f64, train: bool) -> Result<FeatureMaps> {
        check_keep_prob(keep_prob)?;
        let (_b, c, _h, _w) = input.size4()?;
        ensure!(c == 3, "expect a 3-channel image batch, but get {} channels", c);

        let mut xs = Self::normalize(input);
        let mut pools = vec![];

        for block in &self.blocks {
            xs = block
                .iter()
                .fold(xs, |xs, conv| conv.forward(&xs).relu())
                .max_pool2d(&[2, 2], &[2, 2], &[0, 0], &[1, 1], true);
            pools.push(xs.shallow_clone());
        }

        let drop_prob = 1.0 - keep_prob;
        let deep = self
            .fc6
            .forward(&xs)
            .relu()
            .dropout(drop_prob, train);
        let deep = self.fc7.forward(&deep).relu().dropout(drop_prob, train);

        Ok(FeatureMaps {
            shallow: pools[2].shallow_clone(),
            mid: pools[3].shallow_clone(),
            deep,
        })
    }
}
