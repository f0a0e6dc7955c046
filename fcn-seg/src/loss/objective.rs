use crate::common::*;

/// Flatten `[batch, num_classes, height, width]` scores into `[batch * height * width, num_classes]` logits.
///
/// Pixels are ordered by batch, row and column.
pub fn flatten_logits(output: &Tensor, num_classes: usize) -> Result<Tensor> {
    let (_b, c, _h, _w) = output.size4()?;
    ensure!(
        c == num_classes as i64,
        "expect {} channels, but get {}",
        num_classes,
        c
    );
    Ok(output.permute(&[0, 2, 3, 1]).reshape(&[-1, c]))
}

/// Recover `[batch, height, width, num_classes]` from flattened logits.
pub fn unflatten_logits(logits: &Tensor, batch_size: i64, height: i64, width: i64) -> Result<Tensor> {
    let (num_pixels, num_classes) = logits.size2()?;
    ensure!(
        num_pixels == batch_size * height * width,
        "cannot reshape {} pixels into [{}, {}, {}]",
        num_pixels,
        batch_size,
        height,
        width
    );
    Ok(logits.reshape(&[batch_size, height, width, num_classes]))
}

/// The objective initializer.
#[derive(Debug, Clone)]
pub struct ObjectiveInit {
    pub num_classes: usize,
    /// Factor on the collected weight penalty.
    pub reg_weight: f64,
}

impl ObjectiveInit {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            reg_weight: 0.01,
        }
    }

    pub fn build(self) -> Result<Objective> {
        let Self {
            num_classes,
            reg_weight,
        } = self;
        ensure!(num_classes > 0, "num_classes must be positive");
        ensure!(reg_weight >= 0.0, "reg_weight must be non-negative");

        Ok(Objective {
            num_classes,
            reg_weight,
            cross_entropy: CrossEntropyLoss::new(false, Reduction::Mean),
        })
    }
}

/// Pixel-wise softmax cross-entropy plus a weighted regularization term.
#[derive(Debug)]
pub struct Objective {
    num_classes: usize,
    reg_weight: f64,
    cross_entropy: CrossEntropyLoss,
}

#[derive(Debug)]
pub struct ObjectiveOutput {
    /// `[num_pixels, num_classes]` logits.
    pub logits: Tensor,
    /// Mean cross-entropy over pixels.
    pub cross_entropy: Tensor,
    /// The unweighted weight penalty.
    pub regularization: Tensor,
    /// `cross_entropy + reg_weight * regularization`
    pub total_loss: Tensor,
}

impl Objective {
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Compute the loss.
    ///
    /// * `output` - `[batch, num_classes, height, width]` class scores.
    /// * `labels` - One-hot `[batch, num_classes, height, width]` labels.
    /// * `regularization` - The scalar weight penalty collected from the model.
    pub fn forward(
        &self,
        output: &Tensor,
        labels: &Tensor,
        regularization: &Tensor,
    ) -> Result<ObjectiveOutput> {
        let (out_b, _, out_h, out_w) = output.size4()?;
        let (label_b, label_c, label_h, label_w) = labels.size4()?;
        ensure!(
            out_b == label_b,
            "batch size mismatch: {} outputs and {} labels",
            out_b,
            label_b
        );
        ensure!(
            (out_h, out_w) == (label_h, label_w),
            "spatial size mismatch: output is {}x{} but label is {}x{}",
            out_h,
            out_w,
            label_h,
            label_w
        );
        ensure!(
            label_c == self.num_classes as i64,
            "expect {} label classes, but get {}",
            self.num_classes,
            label_c
        );

        let logits = flatten_logits(output, self.num_classes)?;
        let targets = flatten_logits(labels, self.num_classes)?;
        let cross_entropy = self.cross_entropy.forward(&logits, &targets)?;
        let total_loss = &cross_entropy + regularization * self.reg_weight;

        Ok(ObjectiveOutput {
            logits,
            cross_entropy,
            regularization: regularization.shallow_clone(),
            total_loss,
        })
    }
}
