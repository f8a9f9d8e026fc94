//! Archive exporter: every slide image, uncompressed, in one `.zip`.

use crate::error::PipelineError;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const FORMAT: &str = "IMAGES_ZIP";

/// Entry name for the slide at zero-based `index`.
pub fn entry_name(index: usize) -> String {
    format!("image_{}.jpg", index + 1)
}

/// Write `images` as `image_1.jpg … image_N.jpg` (stored, not deflated) to `output`.
///
/// Entry bytes are the source files' bytes exactly.
pub fn build_archive<P: AsRef<Path>>(
    images: &[P],
    output: &Path,
) -> Result<PathBuf, PipelineError> {
    let file = File::create(output).map_err(|e| PipelineError::export(FORMAT, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for (i, image) in images.iter().enumerate() {
        let image = image.as_ref();
        let name = entry_name(i);
        let mut source = File::open(image)
            .map_err(|e| PipelineError::export(FORMAT, format!("{}: {e}", image.display())))?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| PipelineError::export(FORMAT, format!("{name}: {e}")))?;
        std::io::copy(&mut source, &mut zip)
            .map_err(|e| PipelineError::export(FORMAT, format!("{name}: {e}")))?;
    }

    zip.finish()
        .map_err(|e| PipelineError::export(FORMAT, e))?;
    info!("Wrote {} image archive → {}", images.len(), output.display());
    Ok(output.to_path_buf())
}
