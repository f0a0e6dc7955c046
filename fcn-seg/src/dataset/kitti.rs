//! The KITTI road dataset.

use super::batch::{Batch, BatchGenerator, BatchIter};
use crate::common::*;

/// The number of classes in KITTI road labels, namely not-road and road.
pub const KITTI_NUM_CLASSES: usize = 2;

/// The label color of non-road pixels.
pub const KITTI_BACKGROUND_COLOR: [u8; 3] = [255, 0, 0];

const TRAINING_SUBDIR: &str = "data_road/training";
const TESTING_SUBDIR: &str = "data_road/testing";
const IMAGE_SUBDIR: &str = "image_2";
const LABEL_SUBDIR: &str = "gt_image_2";

static LABEL_FILE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(lane|road)_").unwrap());

/// The training split directory under the data directory.
pub fn kitti_training_dir(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(TRAINING_SUBDIR)
}

/// The testing split directory under the data directory.
pub fn kitti_testing_dir(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(TESTING_SUBDIR)
}

/// Verify the directory layout of the KITTI road dataset.
///
/// It expects non-empty `image_2` and `gt_image_2` directories in the
/// training split, and a non-empty `image_2` directory in the testing split.
/// The number of training images must be equal to the number of road labels.
pub fn check_kitti_dataset(data_dir: impl AsRef<Path>) -> Result<()> {
    let data_dir = data_dir.as_ref();
    let training_dir = kitti_training_dir(data_dir);
    let testing_dir = kitti_testing_dir(data_dir);

    let num_training_images = count_png_files(&training_dir.join(IMAGE_SUBDIR))?;
    let num_training_labels = road_label_paths(&training_dir.join(LABEL_SUBDIR))?.len();
    let num_testing_images = count_png_files(&testing_dir.join(IMAGE_SUBDIR))?;

    ensure!(
        num_training_labels > 0,
        "no road labels found in '{}'",
        training_dir.join(LABEL_SUBDIR).display()
    );
    ensure!(
        num_training_images == num_training_labels,
        "found {} training images but {} road labels in '{}'",
        num_training_images,
        num_training_labels,
        training_dir.display()
    );

    info!(
        "found {} training images and {} testing images in '{}'",
        num_training_images,
        num_testing_images,
        data_dir.display()
    );
    Ok(())
}

/// List PNG images in a directory in file name order.
pub fn list_png_files(dir: &Path) -> Result<Vec<PathBuf>> {
    ensure!(
        dir.is_dir(),
        "the dataset directory '{}' does not exist",
        dir.display()
    );
    let pattern = dir.join("*.png");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| format_err!("non-UTF-8 path '{}'", dir.display()))?;
    let mut paths: Vec<_> = glob::glob(pattern)?.try_collect()?;
    paths.sort();
    Ok(paths)
}

fn count_png_files(dir: &Path) -> Result<usize> {
    let count = list_png_files(dir)?.len();
    ensure!(count > 0, "no images found in '{}'", dir.display());
    Ok(count)
}

/// Map image file names to road label paths.
fn road_label_paths(label_dir: &Path) -> Result<HashMap<String, PathBuf>> {
    let paths = list_png_files(label_dir)?;
    let map = paths
        .into_iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            file_name.contains("_road_").then(|| {
                let image_name = LABEL_FILE_NAME_REGEX.replace(file_name, "_").into_owned();
                (image_name, path.clone())
            })
        })
        .collect();
    Ok(map)
}

/// Load an image as a `[3, height, width]` float tensor in `[0, 1]` range.
pub fn load_image(path: impl AsRef<Path>, image_shape: [i64; 2]) -> Result<Tensor> {
    let path = path.as_ref();
    let [height, width] = image_shape;

    tch::no_grad(|| -> Result<_> {
        let image = vision::image::load(path)
            .with_context(|| format!("unable to load image '{}'", path.display()))?;
        let (channels, _h, _w) = image.size3()?;
        ensure!(
            channels == 3,
            "expect a 3-channel image, but '{}' has {} channels",
            path.display(),
            channels
        );
        let image = vision::image::resize(&image, width, height)?.to_kind(Kind::Float) / 255.0;
        Ok(image)
    })
}

/// Decode an RGB label image to a one-hot `[2, height, width]` float tensor.
///
/// Pixels with the background color belong to class 0, and others belong to class 1.
/// The label is resized with nearest neighbor interpolation to keep classes intact.
pub fn decode_label(label_image: &Tensor, background: [u8; 3], image_shape: [i64; 2]) -> Result<Tensor> {
    let [height, width] = image_shape;
    let (channels, orig_h, orig_w) = label_image.size3()?;
    ensure!(
        channels == 3,
        "expect a 3-channel label image, but get {} channels",
        channels
    );

    let label = tch::no_grad(|| {
        let color = Tensor::of_slice(&background)
            .to_device(label_image.device())
            .view([3, 1, 1]);
        let background_mask = label_image
            .to_kind(Kind::Uint8)
            .eq_tensor(&color)
            .to_kind(Kind::Float)
            .sum_dim_intlist(&[0], false, Kind::Float)
            .eq(3.0)
            .to_kind(Kind::Float)
            .view([1, 1, orig_h, orig_w])
            .upsample_nearest2d(&[height, width], None::<f64>, None::<f64>)
            .view([height, width]);
        let foreground_mask = background_mask.ones_like() - &background_mask;
        Tensor::stack(&[background_mask, foreground_mask], 0)
    });

    Ok(label)
}

/// A pair of training image and road label files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KittiRecord {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

/// The training split of KITTI road dataset.
#[derive(Debug)]
pub struct KittiRoadDataset {
    image_shape: [i64; 2],
    background: [u8; 3],
    records: Vec<KittiRecord>,
    rng: StdRng,
}

impl KittiRoadDataset {
    /// Index image and label pairs under the `data_road/training` directory.
    ///
    /// Images are resized to `image_shape` in `[height, width]` order.
    pub fn load(training_dir: impl AsRef<Path>, image_shape: [usize; 2]) -> Result<Self> {
        let training_dir = training_dir.as_ref();
        let [height, width] = image_shape;
        ensure!(
            height > 0 && width > 0,
            "the image shape must be positive, but get {}x{}",
            height,
            width
        );

        let mut labels = road_label_paths(&training_dir.join(LABEL_SUBDIR))?;
        let records: Vec<_> = list_png_files(&training_dir.join(IMAGE_SUBDIR))?
            .into_iter()
            .map(|image_path| -> Result<_> {
                let file_name = image_path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| format_err!("invalid file name '{}'", image_path.display()))?;
                let label_path = labels.remove(file_name).ok_or_else(|| {
                    format_err!("no road label found for '{}'", image_path.display())
                })?;
                Ok(KittiRecord {
                    image_path,
                    label_path,
                })
            })
            .try_collect()?;
        ensure!(
            !records.is_empty(),
            "no training records found in '{}'",
            training_dir.display()
        );

        if !labels.is_empty() {
            warn!(
                "{} road labels have no matching image in '{}'",
                labels.len(),
                training_dir.display()
            );
        }

        Ok(Self {
            image_shape: [height as i64, width as i64],
            background: KITTI_BACKGROUND_COLOR,
            records,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn records(&self) -> &[KittiRecord] {
        &self.records
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    pub fn num_classes(&self) -> usize {
        KITTI_NUM_CLASSES
    }

    /// Load a record as a pair of `[3, height, width]` image and `[2, height, width]` label.
    pub fn load_record(&self, record: &KittiRecord) -> Result<(Tensor, Tensor)> {
        let KittiRecord {
            image_path,
            label_path,
        } = record;
        let image = load_image(image_path, self.image_shape)?;
        let label_image = vision::image::load(label_path)
            .with_context(|| format!("unable to load label '{}'", label_path.display()))?;
        let label = decode_label(&label_image, self.background, self.image_shape)?;
        Ok((image, label))
    }

    fn load_batch(&self, indexes: &[usize]) -> Result<Batch> {
        let pairs: Vec<(Tensor, Tensor)> = indexes
            .iter()
            .map(|&index| self.load_record(&self.records[index]))
            .try_collect()?;
        let (images, labels): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Batch::new(Tensor::stack(&images, 0), Tensor::stack(&labels, 0))
    }
}

impl BatchGenerator for KittiRoadDataset {
    /// Iterate over shuffled records. The last batch can be smaller than `batch_size`.
    fn batches(&mut self, batch_size: usize) -> Result<BatchIter<'_>> {
        ensure!(batch_size > 0, "batch_size must be positive");

        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.shuffle(&mut self.rng);
        let chunks: Vec<Vec<usize>> = order.chunks(batch_size).map(<[usize]>::to_vec).collect();

        let this = &*self;
        Ok(Box::new(
            chunks
                .into_iter()
                .map(move |indexes| this.load_batch(&indexes)),
        ))
    }
}
