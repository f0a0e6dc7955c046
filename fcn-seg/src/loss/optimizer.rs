use crate::common::*;

/// Adam optimizer options.
///
/// The learning rate is given at build time and can be changed per step with `set_lr`.
#[derive(Debug, Clone)]
pub struct AdamInit {
    pub beta1: f64,
    pub beta2: f64,
    pub wd: f64,
}

impl Default for AdamInit {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            wd: 0.0,
        }
    }
}

impl AdamInit {
    pub fn build(self, vs: &nn::VarStore, lr: f64) -> Result<nn::Optimizer> {
        let Self { beta1, beta2, wd } = self;
        ensure!(lr > 0.0, "the lr must be positive");

        let optimizer = nn::Adam { beta1, beta2, wd }.build(vs, lr)?;
        Ok(optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adam_step_updates_variables() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let weight = vs.root().ones("weight", &[3]);
        let mut optimizer = AdamInit::default().build(&vs, 0.1)?;

        optimizer.set_lr(0.1);
        optimizer.backward_step(&weight.sum(Kind::Float));

        let values = Vec::<f32>::from(&weight.detach());
        assert!(values.iter().all(|&value| value < 1.0));
        Ok(())
    }

    #[test]
    fn reject_non_positive_lr() {
        let vs = nn::VarStore::new(Device::Cpu);
        assert!(AdamInit::default().build(&vs, 0.0).is_err());
    }
}
