use anyhow::Result;
use fcn_seg::model::{Backbone, FeatureChannels, FeatureMaps};
use tch::{nn, Tensor};
use tch_modules::{Conv2DInit, ConvND};

/// A small strided encoder to exercise the decoder without VGG16 weights.
#[derive(Debug)]
pub struct TinyBackbone {
    shallow: ConvND,
    mid: ConvND,
    deep: ConvND,
}

impl TinyBackbone {
    pub const CHANNELS: FeatureChannels = FeatureChannels {
        shallow: 4,
        mid: 8,
        deep: 16,
    };

    pub fn new<'p>(path: &nn::Path<'p>) -> Result<Self> {
        let FeatureChannels { shallow, mid, deep } = Self::CHANNELS;
        let strided = |stride| Conv2DInit {
            stride: [stride; 2],
            ..Conv2DInit::new(3)
        };

        Ok(Self {
            shallow: strided(8).build(path / "shallow", 3, shallow)?,
            mid: strided(2).build(path / "mid", shallow, mid)?,
            deep: strided(2).build(path / "deep", mid, deep)?,
        })
    }
}

impl Backbone for TinyBackbone {
    fn channels(&self) -> FeatureChannels {
        Self::CHANNELS
    }

    fn forward_t(&self, input: &Tensor, keep_prob: f64, train: bool) -> Result<FeatureMaps> {
        let shallow = self.shallow.forward(input).relu();
        let mid = self.mid.forward(&shallow).relu();
        let deep = self
            .deep
            .forward(&mid)
            .relu()
            .dropout(1.0 - keep_prob, train);
        Ok(FeatureMaps { shallow, mid, deep })
    }
}
