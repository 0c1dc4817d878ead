use crate::errors::AppResult;
use image::{imageops::FilterType, DynamicImage, ImageReader};
use std::path::{Path, PathBuf};

/// Downscale `input` so its longer side is at most `max_dim`, writing to `output`.
///
/// Returns the path holding the final image: `input` itself when resizing is
/// disabled (`max_dim <= 0`) or when the image already fits and no separate
/// destination was requested, `output` otherwise.
pub fn resize_to_max_dim(input: &Path, output: &Path, max_dim: i64) -> AppResult<PathBuf> {
    if max_dim <= 0 {
        return Ok(input.to_path_buf());
    }

    let img = ImageReader::open(input)?.with_guessed_format()?.decode()?;
    let (width, height) = (img.width(), img.height());
    let largest = width.max(height);

    if i64::from(largest) <= max_dim {
        if input == output {
            return Ok(input.to_path_buf());
        }
        save(img, output)?;
        return Ok(output.to_path_buf());
    }

    let (w, h) = scaled_dims(width, height, max_dim);
    let resized = img.resize_exact(w, h, FilterType::Lanczos3);
    save(resized, output)?;
    Ok(output.to_path_buf())
}

/// Target dimensions for a `width` x `height` image bounded by `max_dim`.
pub fn scaled_dims(width: u32, height: u32, max_dim: i64) -> (u32, u32) {
    let largest = width.max(height);
    let scale = max_dim as f64 / f64::from(largest);
    let dim = |d: u32| ((f64::from(d) * scale) as u32).max(1);
    (dim(width), dim(height))
}

fn save(img: DynamicImage, output: &Path) -> AppResult<()> {
    // JPEG has no alpha channel
    let img = if is_jpeg(output) { DynamicImage::ImageRgb8(img.to_rgb8()) } else { img };
    img.save(output)?;
    Ok(())
}

pub fn is_jpeg(path: &Path) -> bool {
    matches!(lower_ext(path).as_str(), ".jpg" | ".jpeg")
}

/// Lower-cased extension including the leading dot, or an empty string.
pub fn lower_ext(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
