use crate::common::*;
use std::io;

/// The path of the VGG16 weights under the data directory.
pub fn pretrained_vgg_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join("vgg").join("vgg16.ot")
}

/// Download the VGG16 weights unless they are already present, and return their path.
///
/// The file is written to a `.part` file first and renamed when complete,
/// so an interrupted download is fetched again on the next run.
pub fn maybe_download_pretrained_vgg(data_dir: impl AsRef<Path>, url: &str) -> Result<PathBuf> {
    let path = pretrained_vgg_path(data_dir);
    if path.is_file() {
        info!("use pretrained weights '{}'", path.display());
        return Ok(path);
    }

    let dir = path
        .parent()
        .ok_or_else(|| format_err!("invalid weights path '{}'", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("unable to create '{}'", dir.display()))?;

    info!("downloading pretrained VGG16 weights from '{}'", url);
    let mut response = reqwest::blocking::get(url).with_context(|| format!("GET {}", url))?;
    let status = response.status();
    ensure!(status.is_success(), "HTTP {} for {}", status, url);

    let part_path = path.with_extension("ot.part");
    {
        let mut writer = BufWriter::new(File::create(&part_path)?);
        let size = io::copy(&mut response, &mut writer)?;
        writer.flush()?;
        info!("downloaded {} bytes", size);
    }
    fs::rename(&part_path, &path)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_download_for_existing_weights() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = pretrained_vgg_path(dir.path());
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, b"weights")?;

        // the url is never requested
        let returned = maybe_download_pretrained_vgg(dir.path(), "http://invalid.invalid/vgg16.ot")?;
        assert_eq!(returned, path);
        assert_eq!(fs::read(&path)?, b"weights");
        Ok(())
    }
}
