use crate::common::*;

/// Softmax cross-entropy over `[batch_size, n_classes]` logits.
///
/// Sparse targets are `[batch_size]` int64 class indexes. Dense targets are
/// `[batch_size, n_classes]` class distributions, typically one-hot vectors.
#[derive(Debug)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
    sparse_target: bool,
}

impl CrossEntropyLoss {
    pub fn new(sparse_target: bool, reduction: Reduction) -> Self {
        Self {
            reduction,
            sparse_target,
        }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        let (batch_size, num_classes) = input.size2()?;

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.numel() == 0 && self.reduction == Reduction::Mean {
            return Ok(
                Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false)
            );
        }

        let loss = if self.sparse_target {
            ensure!(
                target.kind() == Kind::Int64 && target.size1()? == batch_size,
                "expect target a [{}] int64 tensor",
                batch_size
            );
            debug_assert!(
                bool::from(target.ge(0).all()) && bool::from(target.lt(num_classes).all()),
                "target values must be in range of [0, {})",
                num_classes
            );

            -input
                .log_softmax(1, Kind::Float)
                .gather(1, &target.unsqueeze(1), false)
                .squeeze_dim(1)
        } else {
            ensure!(
                target.size2()? == (batch_size, num_classes),
                "expect target a [{}, {}] tensor, but get {:?}",
                batch_size,
                num_classes,
                target.size()
            );

            let target = target.to_kind(Kind::Float).set_requires_grad(false);
            -(input.log_softmax(1, Kind::Float) * target).sum_dim_intlist(&[1], false, Kind::Float)
        };

        let loss = match self.reduction {
            Reduction::None => loss,
            Reduction::Sum => loss.sum(Kind::Float),
            Reduction::Mean => loss.mean(Kind::Float),
            Reduction::Other(value) => bail!("unsupported reduction {}", value),
        };
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use tch::nn::OptimizerConfig as _;

    #[test]
    fn cross_entropy_loss() -> Result<()> {
        let mut rng = rand::thread_rng();
        let device = Device::Cpu;

        let n_batch = 32;
        let n_class = rng.gen_range(2..10);

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let loss_fn = CrossEntropyLoss::new(true, Reduction::Mean);

        let input = root.randn("input", &[n_batch, n_class], 0.0, 1.0);
        let target =
            Tensor::randint(n_class, &[n_batch], (Kind::Int64, device)).set_requires_grad(false);

        let mut optimizer = nn::Adam::default().build(&vs, 0.1)?;

        for _ in 0..500 {
            let loss = loss_fn.forward(&input, &target)?;
            optimizer.backward_step(&loss);
        }

        let accuracy = i64::from(
            input
                .max_dim(1, false)
                .1
                .eq_tensor(&target)
                .sum(Kind::Int64),
        ) as f64
            / n_batch as f64;
        ensure!(accuracy >= 0.99, "the loss does not coverage");

        Ok(())
    }

    #[test]
    fn dense_one_hot_target_matches_sparse_target() -> Result<()> {
        let device = Device::Cpu;
        let n_batch = 16;
        let n_class = 3;

        let input = Tensor::randn(&[n_batch, n_class], (Kind::Float, device));
        let sparse = Tensor::randint(n_class, &[n_batch], (Kind::Int64, device));
        let dense = sparse.one_hot(n_class).to_kind(Kind::Float);

        let sparse_loss =
            f64::from(&CrossEntropyLoss::new(true, Reduction::Mean).forward(&input, &sparse)?);
        let dense_loss =
            f64::from(&CrossEntropyLoss::new(false, Reduction::Mean).forward(&input, &dense)?);

        assert!(dense_loss.is_finite() && dense_loss >= 0.0);
        assert_abs_diff_eq!(sparse_loss, dense_loss, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn unreduced_loss_per_sample() -> Result<()> {
        let input = Tensor::of_slice(&[0f32, 0.0, 0.0, 100.0]).view([2, 2]);
        let target = Tensor::of_slice(&[0i64, 1]);
        let loss = CrossEntropyLoss::new(true, Reduction::None).forward(&input, &target)?;

        assert_eq!(loss.size(), vec![2]);
        assert_abs_diff_eq!(f64::from(&loss.get(0)), 2f64.ln(), epsilon = 1e-5);
        assert_abs_diff_eq!(f64::from(&loss.get(1)), 0.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn reject_mismatched_dense_target() {
        let input = Tensor::randn(&[4, 2], (Kind::Float, Device::Cpu));
        let target = Tensor::zeros(&[4, 3], (Kind::Float, Device::Cpu));
        assert!(CrossEntropyLoss::new(false, Reduction::Mean)
            .forward(&input, &target)
            .is_err());
    }
}
