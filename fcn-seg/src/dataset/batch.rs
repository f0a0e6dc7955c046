use crate::common::*;

/// A pair of image batch and label batch.
///
/// * `image` - `[batch, 3, height, width]` float image in `[0, 1]` range.
/// * `label` - `[batch, num_classes, height, width]` one-hot float label.
#[derive(Debug, TensorLike)]
pub struct Batch {
    pub image: Tensor,
    pub label: Tensor,
}

impl Batch {
    pub fn new(image: Tensor, label: Tensor) -> Result<Self> {
        let (image_b, image_c, image_h, image_w) = image.size4()?;
        let (label_b, _label_c, label_h, label_w) = label.size4()?;
        ensure!(image_c == 3, "expect 3-channel images, but get {}", image_c);
        ensure!(
            image_b == label_b,
            "the batch has {} images but {} labels",
            image_b,
            label_b
        );
        ensure!(
            (image_h, image_w) == (label_h, label_w),
            "the image size {}x{} does not match the label size {}x{}",
            image_h,
            image_w,
            label_h,
            label_w
        );
        Ok(Self { image, label })
    }

    pub fn len(&self) -> usize {
        self.image.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<Batch>> + 'a>;

/// The source of training batches.
///
/// Each call to [batches](BatchGenerator::batches) starts a new pass over
/// the data and returns a lazy and finite sequence of batches.
pub trait BatchGenerator {
    fn batches(&mut self, batch_size: usize) -> Result<BatchIter<'_>>;
}

impl<F> BatchGenerator for F
where
    F: FnMut(usize) -> Result<Vec<Batch>>,
{
    fn batches(&mut self, batch_size: usize) -> Result<BatchIter<'_>> {
        let batches = self(batch_size)?;
        Ok(Box::new(batches.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(shape: &[i64]) -> Tensor {
        Tensor::zeros(shape, (Kind::Float, Device::Cpu))
    }

    #[test]
    fn batch_checks_pairing() {
        assert!(Batch::new(zeros(&[2, 3, 8, 8]), zeros(&[2, 2, 8, 8])).is_ok());
        assert!(Batch::new(zeros(&[2, 3, 8, 8]), zeros(&[1, 2, 8, 8])).is_err());
        assert!(Batch::new(zeros(&[2, 3, 8, 8]), zeros(&[2, 2, 8, 4])).is_err());
        assert!(Batch::new(zeros(&[2, 1, 8, 8]), zeros(&[2, 2, 8, 8])).is_err());
    }

    #[test]
    fn closure_generator_restarts_per_call() -> Result<()> {
        let mut calls = 0;
        let mut generator = |batch_size: usize| -> Result<Vec<Batch>> {
            calls += 1;
            (0..2)
                .map(|_| {
                    Batch::new(
                        zeros(&[batch_size as i64, 3, 4, 4]),
                        zeros(&[batch_size as i64, 2, 4, 4]),
                    )
                })
                .collect()
        };

        for _ in 0..3 {
            let batches: Vec<_> = generator.batches(5)?.try_collect()?;
            assert_eq!(batches.len(), 2);
            assert!(batches.iter().all(|batch| batch.len() == 5));
        }
        drop(generator);
        assert_eq!(calls, 3);
        Ok(())
    }
}
