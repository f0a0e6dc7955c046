mod common;

use anyhow::Result;
use common::TinyBackbone;
use fcn_seg::{
    loss::{flatten_logits, unflatten_logits, AdamInit, ObjectiveInit, ObjectiveOutput},
    model::{DecoderInit, FcnModel},
};
use tch::{nn, Device, Kind, Tensor};

#[test]
fn unflatten_restores_spatial_layout() -> Result<()> {
    let output = Tensor::randn(&[2, 3, 4, 8], (Kind::Float, Device::Cpu));
    let logits = flatten_logits(&output, 3)?;
    assert_eq!(logits.size(), vec![2 * 4 * 8, 3]);

    let restored = unflatten_logits(&logits, 2, 4, 8)?;
    assert_eq!(restored, output.permute(&[0, 2, 3, 1]));
    assert!(unflatten_logits(&logits, 2, 4, 4).is_err());
    Ok(())
}

#[test]
fn loss_decreases_on_small_dataset() -> Result<()> {
    tch::manual_seed(0);
    let device = Device::Cpu;
    let vs = nn::VarStore::new(device);
    let root = vs.root();

    let model = FcnModel::new(
        &root / "decoder",
        TinyBackbone::new(&(&root / "backbone"))?,
        DecoderInit::new(2),
    )?;
    let objective = ObjectiveInit::new(2).build()?;
    let mut optimizer = AdamInit::default().build(&vs, 1e-2)?;

    // the left half of each image is road
    let image = Tensor::rand(&[2, 3, 32, 32], (Kind::Float, device));
    let road = Tensor::zeros(&[2, 1, 32, 32], (Kind::Float, device));
    let _ = road.narrow(3, 0, 16).fill_(1.0);
    let label = Tensor::cat(&[road.ones_like() - &road, road.shallow_clone()], 1);

    let losses: Vec<f64> = (0..60)
        .map(|_| -> Result<_> {
            let output = model.forward_t(&image, 1.0, true)?;
            let ObjectiveOutput { total_loss, .. } =
                objective.forward(&output, &label, &model.regularization_loss())?;
            optimizer.backward_step(&total_loss);
            Ok(f64::from(&total_loss))
        })
        .collect::<Result<_>>()?;

    assert!(losses.iter().all(|loss| loss.is_finite() && *loss >= 0.0));
    let head: f64 = losses[..10].iter().sum::<f64>() / 10.0;
    let tail: f64 = losses[50..].iter().sum::<f64>() / 10.0;
    assert!(
        tail < head,
        "the loss does not decrease: {:.4} -> {:.4}",
        head,
        tail
    );
    Ok(())
}
