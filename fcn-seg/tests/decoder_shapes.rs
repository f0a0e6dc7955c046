mod common;

use anyhow::Result;
use common::TinyBackbone;
use fcn_seg::model::{Backbone, DecoderInit, FcnModel, FeatureChannels, FeatureMaps};
use tch::{nn, Device, Kind, Tensor};

fn randn(shape: &[i64]) -> Tensor {
    Tensor::randn(shape, (Kind::Float, Device::Cpu))
}

#[test]
fn decoder_recovers_vgg16_input_resolution() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let channels = FeatureChannels {
        shallow: 256,
        mid: 512,
        deep: 4096,
    };
    let decoder = DecoderInit::new(2).build(&vs.root() / "decoder", channels)?;

    // VGG16 feature maps of a 160x576 image
    let features = FeatureMaps {
        shallow: randn(&[1, 256, 20, 72]),
        mid: randn(&[1, 512, 10, 36]),
        deep: randn(&[1, 4096, 5, 18]),
    };
    let output = tch::no_grad(|| decoder.forward(&features))?;

    assert_eq!(output.size(), vec![1, 2, 160, 576]);
    Ok(())
}

#[test]
fn decoder_output_matches_input_for_various_sizes() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let backbone = TinyBackbone::new(&(&vs.root() / "backbone"))?;

    for num_classes in [1, 2, 5] {
        let model = FcnModel::new(
            &vs.root() / format!("decoder_{}", num_classes),
            TinyBackbone::new(&(&vs.root() / format!("backbone_{}", num_classes)))?,
            DecoderInit::new(num_classes),
        )?;

        for (batch_size, height, width) in [(1, 32, 32), (2, 64, 96), (3, 160, 576)] {
            let input = Tensor::rand(&[batch_size, 3, height, width], (Kind::Float, Device::Cpu));
            let output = tch::no_grad(|| model.forward_t(&input, 1.0, false))?;
            assert_eq!(
                output.size(),
                vec![batch_size, num_classes as i64, height, width]
            );
        }
    }

    let input = Tensor::rand(&[1, 3, 64, 64], (Kind::Float, Device::Cpu));
    let features = backbone.forward_t(&input, 1.0, false)?;
    assert_eq!(features.shallow.size(), vec![1, 4, 8, 8]);
    assert_eq!(features.mid.size(), vec![1, 8, 4, 4]);
    assert_eq!(features.deep.size(), vec![1, 16, 2, 2]);
    Ok(())
}

#[test]
fn reject_image_size_not_multiple_of_32() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = FcnModel::new(
        &vs.root() / "decoder",
        TinyBackbone::new(&(&vs.root() / "backbone"))?,
        DecoderInit::new(2),
    )?;
    let input = Tensor::rand(&[1, 3, 40, 64], (Kind::Float, Device::Cpu));
    assert!(model.forward_t(&input, 1.0, false).is_err());
    Ok(())
}

#[test]
fn reject_mismatched_skip_connection() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let channels = FeatureChannels {
        shallow: 4,
        mid: 8,
        deep: 16,
    };
    let decoder = DecoderInit::new(2).build(&vs.root() / "decoder", channels)?;
    let features = FeatureMaps {
        shallow: randn(&[1, 4, 8, 8]),
        mid: randn(&[1, 8, 3, 3]),
        deep: randn(&[1, 16, 2, 2]),
    };
    assert!(decoder.forward(&features).is_err());
    Ok(())
}

#[test]
fn regularization_covers_all_decoder_kernels() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let channels = TinyBackbone::CHANNELS;
    let decoder = DecoderInit::new(2).build(&vs.root() / "decoder", channels)?;

    let expect: f64 = vs
        .variables()
        .iter()
        .filter(|(name, _)| name.ends_with("weight"))
        .map(|(_, weight)| 1e-3 * f64::from(&weight.pow_tensor_scalar(2).sum(Kind::Float)) / 2.0)
        .sum();
    let actual = f64::from(&decoder.regularization_loss());

    approx::assert_relative_eq!(actual, expect, max_relative = 1e-4);
    Ok(())
}
