use crate::{common::*, l2_regularizer::L2Regularizer};

pub use conv_init::*;
pub use conv_nd_::*;

mod conv_init {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct ConvNDInit<S>
    where
        S: AsRef<[usize]>,
    {
        pub ksize: S,
        pub stride: S,
        pub padding: S,
        pub output_padding: S,
        pub dilation: S,
        pub groups: usize,
        pub bias: bool,
        pub transposed: bool,
        pub ws_init: nn::Init,
        pub bs_init: nn::Init,
        /// Optional L2 penalty applied on the kernel weight.
        pub kernel_regularizer: Option<L2Regularizer>,
    }

    pub type Conv2DInit = ConvNDInit<[usize; 2]>;

    impl<const DIM: usize> ConvNDInit<[usize; DIM]> {
        /// Regular convolution preserving the spatial size for odd kernel sizes.
        pub fn new(ksize: usize) -> Self {
            Self {
                ksize: [ksize; DIM],
                stride: [1; DIM],
                padding: [ksize / 2; DIM],
                output_padding: [0; DIM],
                dilation: [1; DIM],
                groups: 1,
                bias: true,
                transposed: false,
                ws_init: nn::Init::KaimingUniform,
                bs_init: nn::Init::Const(0.0),
                kernel_regularizer: None,
            }
        }

        /// Transposed convolution that enlarges the spatial size exactly by `stride`.
        ///
        /// The output size is `(in - 1) * stride - 2 * padding + ksize`, so
        /// `padding = (ksize - stride) / 2` yields `in * stride` when
        /// `ksize - stride` is even.
        pub fn upsample(ksize: usize, stride: usize) -> Result<Self> {
            ensure!(stride > 0, "stride must be positive");
            ensure!(
                ksize >= stride && (ksize - stride) % 2 == 0,
                "kernel size {} cannot upsample exactly by stride {}",
                ksize,
                stride
            );

            Ok(Self {
                stride: [stride; DIM],
                padding: [(ksize - stride) / 2; DIM],
                transposed: true,
                ..Self::new(ksize)
            })
        }
    }

    impl<S> ConvNDInit<S>
    where
        S: AsRef<[usize]>,
    {
        pub fn dim(&self) -> Result<usize> {
            let Self {
                ksize,
                stride,
                padding,
                output_padding,
                dilation,
                ..
            } = self;
            let ndims = ksize.as_ref().len();

            ensure!(
                [
                    stride.as_ref(),
                    padding.as_ref(),
                    output_padding.as_ref(),
                    dilation.as_ref()
                ]
                .iter()
                .all(|param| param.len() == ndims),
                "parameter dimension mismatch"
            );

            Ok(ndims)
        }

        pub fn build<'a>(
            self,
            path: impl Borrow<nn::Path<'a>>,
            in_dim: usize,
            out_dim: usize,
        ) -> Result<ConvND> {
            self.dim()?;

            let Self {
                ksize,
                stride,
                padding,
                output_padding,
                dilation,
                groups,
                bias,
                transposed,
                ws_init,
                bs_init,
                kernel_regularizer,
            } = self;

            ensure!(
                groups > 0 && in_dim % groups == 0,
                "in_dim must be multiple of group"
            );

            let path = path.borrow();
            let in_dim = in_dim as i64;
            let out_dim = out_dim as i64;
            let to_i64 = |values: &S| -> Vec<i64> {
                values.as_ref().iter().map(|&v| v as i64).collect()
            };
            let ksize_ = to_i64(&ksize);
            let groups = groups as i64;

            let bs = bias.then(|| path.var("bias", &[out_dim], bs_init));
            let ws = {
                let weight_size: Vec<i64> = if transposed {
                    vec![in_dim, out_dim / groups]
                } else {
                    vec![out_dim, in_dim / groups]
                }
                .into_iter()
                .chain(ksize_)
                .collect();
                path.var("weight", weight_size.as_slice(), ws_init)
            };

            Ok(ConvND {
                stride: to_i64(&stride),
                padding: to_i64(&padding),
                output_padding: to_i64(&output_padding),
                dilation: to_i64(&dilation),
                groups,
                weight: ws,
                bias: bs,
                transposed,
                kernel_regularizer,
            })
        }
    }
}

mod conv_nd_ {
    use super::*;

    #[derive(Debug)]
    pub struct ConvND {
        pub(super) stride: Vec<i64>,
        pub(super) padding: Vec<i64>,
        pub(super) output_padding: Vec<i64>,
        pub(super) dilation: Vec<i64>,
        pub(super) groups: i64,
        pub(super) weight: Tensor,
        pub(super) bias: Option<Tensor>,
        pub(super) transposed: bool,
        pub(super) kernel_regularizer: Option<L2Regularizer>,
    }

    impl ConvND {
        pub fn weight(&self) -> &Tensor {
            &self.weight
        }

        pub fn bias(&self) -> Option<&Tensor> {
            self.bias.as_ref()
        }

        pub fn is_transposed(&self) -> bool {
            self.transposed
        }

        pub fn forward(&self, input: &Tensor) -> Tensor {
            let Self {
                ref stride,
                ref padding,
                ref output_padding,
                ref dilation,
                groups,
                ref weight,
                ref bias,
                transposed,
                ..
            } = *self;

            input.convolution(
                weight,
                bias.as_ref(),
                stride,
                padding,
                dilation,
                transposed,
                output_padding,
                groups,
            )
        }

        /// The kernel penalty, or `None` if the layer is not regularized.
        pub fn regularization_loss(&self) -> Option<Tensor> {
            self.kernel_regularizer
                .as_ref()
                .map(|regularizer| regularizer.forward(&self.weight))
        }
    }
}
