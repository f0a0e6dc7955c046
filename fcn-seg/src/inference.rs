//! Road segmentation inference and visualization.

use crate::{
    common::*,
    dataset::{list_png_files, load_image},
    model::{Backbone, FcnModel},
};

/// The class index of road pixels.
pub const ROAD_CLASS: i64 = 1;

const OVERLAY_COLOR: [f32; 3] = [0.0, 255.0, 0.0];
const OVERLAY_ALPHA: f64 = 127.0 / 255.0;

/// Predict the `[height, width]` boolean road mask of a `[3, height, width]` image.
///
/// Dropout is disabled and a pixel is marked if its road probability exceeds 0.5.
pub fn segment<B>(model: &FcnModel<B>, image: &Tensor, device: Device) -> Result<Tensor>
where
    B: Backbone,
{
    tch::no_grad(|| {
        let input = image.unsqueeze(0).to_device(device);
        let output = model.forward_t(&input, 1.0, false)?;
        let road_prob = output.softmax(1, Kind::Float).select(1, ROAD_CLASS).select(0, 0);
        Ok(road_prob.gt(0.5).to_device(Device::Cpu))
    })
}

/// Paint the masked pixels of a `[3, height, width]` image in translucent green.
///
/// The input image is in `[0, 1]` range, and the output is an uint8 image.
pub fn overlay_mask(image: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let (_c, image_h, image_w) = image.size3()?;
    let (mask_h, mask_w) = mask.size2()?;
    ensure!(
        (image_h, image_w) == (mask_h, mask_w),
        "the mask size {}x{} does not match the image size {}x{}",
        mask_h,
        mask_w,
        image_h,
        image_w
    );

    let blended = tch::no_grad(|| {
        let image = image.to_device(Device::Cpu) * 255.0;
        let color = Tensor::of_slice(&OVERLAY_COLOR).view([3, 1, 1]);
        let alpha = mask.to_kind(Kind::Float).unsqueeze(0) * OVERLAY_ALPHA;
        let blended = image * (alpha.ones_like() - &alpha) + color * &alpha;
        blended.round().clamp(0.0, 255.0).to_kind(Kind::Uint8)
    });
    Ok(blended)
}

/// Segment every PNG image in `image_dir` and save the overlaid images to `output_dir`.
///
/// It returns the number of saved samples.
pub fn save_inference_samples<B>(
    model: &FcnModel<B>,
    image_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    image_shape: [usize; 2],
    device: Device,
) -> Result<usize>
where
    B: Backbone,
{
    let image_dir = image_dir.as_ref();
    let output_dir = output_dir.as_ref();
    let [height, width] = image_shape;
    let image_shape = [height as i64, width as i64];

    std::fs::create_dir_all(output_dir)?;
    let image_paths = list_png_files(image_dir)?;

    image_paths.iter().try_for_each(|image_path| -> Result<_> {
        let file_name = image_path
            .file_name()
            .ok_or_else(|| format_err!("invalid file name '{}'", image_path.display()))?;
        let image = load_image(image_path, image_shape)?;
        let mask = segment(model, &image, device)?;
        let sample = overlay_mask(&image, &mask)?;
        vision::image::save(&sample, output_dir.join(file_name))?;
        Ok(())
    })?;

    info!(
        "saved {} inference samples to '{}'",
        image_paths.len(),
        output_dir.display()
    );
    Ok(image_paths.len())
}
