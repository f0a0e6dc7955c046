//! The encoder interface shared by segmentation backbones.

use crate::common::*;

/// Channel depths of the three feature maps exposed by a backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureChannels {
    pub shallow: usize,
    pub mid: usize,
    pub deep: usize,
}

/// Intermediate feature maps in `[batch, channels, height, width]` layout.
///
/// The shallow, mid and deep maps are down-sampled by 8, 16 and 32 times
/// respectively with respect to the input image.
#[derive(Debug, TensorLike)]
pub struct FeatureMaps {
    pub shallow: Tensor,
    pub mid: Tensor,
    pub deep: Tensor,
}

/// A classification network reused as a feature extractor.
pub trait Backbone
where
    Self: Debug,
{
    /// The overall down-sampling factor of the deepest feature map.
    fn reduction(&self) -> usize {
        32
    }

    /// The channel depths of the produced feature maps.
    fn channels(&self) -> FeatureChannels;

    /// Extract feature maps from a `[batch, 3, height, width]` image batch in `[0, 1]` range.
    ///
    /// `keep_prob` is the probability to keep an activation in dropout layers,
    /// which only takes effect if `train` is set.
    fn forward_t(&self, input: &Tensor, keep_prob: f64, train: bool) -> Result<FeatureMaps>;
}

pub(crate) fn check_keep_prob(keep_prob: f64) -> Result<()> {
    ensure!(
        keep_prob > 0.0 && keep_prob <= 1.0,
        "keep_prob must be in range (0, 1], but get {}",
        keep_prob
    );
    Ok(())
}
