use crate::common::*;

/// Weight penalty computing `scale * sum(w^2) / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct L2Regularizer {
    scale: f64,
}

impl L2Regularizer {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn forward(&self, weight: &Tensor) -> Tensor {
        // return zero tensor if the weight is empty
        if weight.numel() == 0 {
            return Tensor::zeros(&[], (Kind::Float, weight.device())).set_requires_grad(false);
        }

        weight.pow_tensor_scalar(2).sum(Kind::Float) * (self.scale / 2.0)
    }
}
