use super::{
    backbone::Backbone,
    decoder::{Decoder, DecoderInit},
    vgg16::Vgg16,
};
use crate::common::*;

/// A fully convolutional network made of a backbone and an up-sampling decoder.
#[derive(Debug)]
pub struct FcnModel<B = Vgg16>
where
    B: Backbone,
{
    backbone: B,
    decoder: Decoder,
}

impl<B> FcnModel<B>
where
    B: Backbone,
{
    /// Attach a decoder to the backbone. Decoder variables are created under `path`.
    pub fn new<'p>(path: impl Borrow<nn::Path<'p>>, backbone: B, init: DecoderInit) -> Result<Self> {
        let decoder = init.build(path, backbone.channels())?;
        Ok(Self { backbone, decoder })
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn num_classes(&self) -> usize {
        self.decoder.num_classes()
    }

    /// Compute `[batch, num_classes, height, width]` class scores for a
    /// `[batch, 3, height, width]` image batch.
    pub fn forward_t(&self, input: &Tensor, keep_prob: f64, train: bool) -> Result<Tensor> {
        let (_b, _c, height, width) = input.size4()?;
        let reduction = self.backbone.reduction() as i64;
        ensure!(
            height % reduction == 0 && width % reduction == 0,
            "the image size {}x{} must be multiple of {}",
            height,
            width,
            reduction
        );

        let features = self.backbone.forward_t(input, keep_prob, train)?;
        self.decoder.forward(&features)
    }

    /// The weight penalty to be added to the objective.
    pub fn regularization_loss(&self) -> Tensor {
        self.decoder.regularization_loss()
    }
}
