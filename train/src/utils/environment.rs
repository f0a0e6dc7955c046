use crate::common::*;

/// Report the libtorch runtime and warn if no GPU is usable.
pub fn check_environment() {
    let cuda_available = tch::Cuda::is_available();
    info!(
        "libtorch runtime: cuda: {}, cudnn: {}, devices: {}, threads: {}",
        cuda_available,
        tch::Cuda::cudnn_is_available(),
        tch::Cuda::device_count(),
        tch::get_num_threads()
    );

    if !cuda_available {
        warn!("No GPU found. Please use a GPU to train your neural network.");
    }
}
