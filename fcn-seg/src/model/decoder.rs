//! The FCN-8s decoder with transposed convolutions and scaled skip connections.

use super::backbone::{FeatureChannels, FeatureMaps};
use crate::common::*;

/// Decoder initializer.
///
/// The channels of intermediate up-sampled maps follow the channels of the
/// mid and shallow feature maps, so that skip connections can be added element-wise.
#[derive(Debug, Clone)]
pub struct DecoderInit {
    pub num_classes: usize,
    /// Factor on the mid feature map before it is added to the decoder.
    pub mid_skip_scale: f64,
    /// Factor on the shallow feature map before it is added to the decoder.
    pub shallow_skip_scale: f64,
    /// Scale of the L2 penalty on every convolution kernel.
    pub kernel_l2_scale: f64,
}

impl DecoderInit {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            mid_skip_scale: 0.01,
            shallow_skip_scale: 1e-4,
            kernel_l2_scale: 1e-3,
        }
    }

    pub fn build<'p>(
        self,
        path: impl Borrow<nn::Path<'p>>,
        channels: FeatureChannels,
    ) -> Result<Decoder> {
        let Self {
            num_classes,
            mid_skip_scale,
            shallow_skip_scale,
            kernel_l2_scale,
        } = self;
        let FeatureChannels { shallow, mid, deep } = channels;

        ensure!(num_classes > 0, "num_classes must be positive");
        ensure!(
            kernel_l2_scale >= 0.0,
            "kernel_l2_scale must be non-negative"
        );

        let path = path.borrow();
        let regularizer = Some(L2Regularizer::new(kernel_l2_scale));
        let regularized = |init: Conv2DInit| Conv2DInit {
            kernel_regularizer: regularizer,
            ..init
        };

        let score = regularized(Conv2DInit::new(1)).build(path / "score", deep, num_classes)?;
        let upsample_mid =
            regularized(Conv2DInit::upsample(4, 2)?).build(path / "upsample_mid", num_classes, mid)?;
        let upsample_shallow = regularized(Conv2DInit::upsample(4, 2)?).build(
            path / "upsample_shallow",
            mid,
            shallow,
        )?;
        let upsample_output = regularized(Conv2DInit::upsample(16, 8)?).build(
            path / "upsample_output",
            shallow,
            num_classes,
        )?;

        Ok(Decoder {
            num_classes,
            mid_skip_scale,
            shallow_skip_scale,
            score,
            upsample_mid,
            upsample_shallow,
            upsample_output,
        })
    }
}

/// The decoder producing per-pixel class scores at the input resolution.
#[derive(Debug)]
pub struct Decoder {
    num_classes: usize,
    mid_skip_scale: f64,
    shallow_skip_scale: f64,
    score: ConvND,
    upsample_mid: ConvND,
    upsample_shallow: ConvND,
    upsample_output: ConvND,
}

impl Decoder {
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Compute `[batch, num_classes, height, width]` class scores, where the
    /// spatial size is 32 times of the deep feature map.
    pub fn forward(&self, features: &FeatureMaps) -> Result<Tensor> {
        let FeatureMaps { shallow, mid, deep } = features;

        let xs = self.score.forward(deep);

        let xs = self.upsample_mid.forward(&xs);
        ensure_same_shape("mid", &xs, mid)?;
        let xs = xs + mid * self.mid_skip_scale;

        let xs = self.upsample_shallow.forward(&xs);
        ensure_same_shape("shallow", &xs, shallow)?;
        let xs = xs + shallow * self.shallow_skip_scale;

        Ok(self.upsample_output.forward(&xs))
    }

    /// The sum of L2 penalties of convolution kernels.
    pub fn regularization_loss(&self) -> Tensor {
        let Self {
            score,
            upsample_mid,
            upsample_shallow,
            upsample_output,
            ..
        } = self;
        let device = score.weight().device();

        [score, upsample_mid, upsample_shallow, upsample_output]
            .iter()
            .filter_map(|conv| conv.regularization_loss())
            .fold(
                Tensor::zeros(&[], (Kind::Float, device)),
                |sum, loss| sum + loss,
            )
    }
}

fn ensure_same_shape(name: &str, upsampled: &Tensor, skip: &Tensor) -> Result<()> {
    ensure!(
        upsampled.size() == skip.size(),
        "the up-sampled map with shape {:?} does not match the {} feature map with shape {:?}",
        upsampled.size(),
        name,
        skip.size()
    );
    Ok(())
}
