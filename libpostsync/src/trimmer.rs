//! Dark border removal for images
//!
//! A single scan line through the vertical center decides how much solid
//! dark margin sits on the left and right edges. When a meaningful border
//! is found the image is cropped and written next to the original (or to
//! the configured output directory) under a `_corrected` name.
//!
//! Trimming never fails the caller's flow: any error while reading,
//! decoding or writing is logged, reported as an [`Event::ImageTrimFailed`]
//! and the original URI is handed back. The only error a caller sees is
//! [`ImageError::Busy`] when another trim is already running.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{ImageError, Result};
use crate::events::{Event, EventBus};

/// Channel value below which a pixel counts as black (absorbs JPEG noise)
pub const BLACK_THRESHOLD: u8 = 30;

/// Crops narrower than this many pixels are treated as noise
pub const BORDER_TOLERANCE: u32 = 2;

pub const CORRECTED_SUFFIX: &str = "_corrected";

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone)]
pub struct TrimOptions {
    pub black_threshold: u8,
    pub border_tolerance: u32,
    pub suffix: String,
    /// Where corrected files go; `None` writes beside the original
    pub output_dir: Option<PathBuf>,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            black_threshold: BLACK_THRESHOLD,
            border_tolerance: BORDER_TOLERANCE,
            suffix: CORRECTED_SUFFIX.to_string(),
            output_dir: None,
        }
    }
}

/// Horizontal content bounds found on the center scan line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    /// First non-black column, or 0
    pub left: u32,
    /// One past the last non-black column, or the image width
    pub right: u32,
}

impl ContentBounds {
    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }
}

fn is_black(pixel: image::Rgba<u8>, threshold: u8) -> bool {
    pixel.0[..3].iter().all(|channel| *channel < threshold)
}

/// Scan the center row from both edges for the first non-black column
pub fn find_content_bounds(image: &DynamicImage, threshold: u8) -> ContentBounds {
    let (width, height) = image.dimensions();
    let row = height / 2;

    let left = (0..width)
        .find(|x| !is_black(image.get_pixel(*x, row), threshold))
        .unwrap_or(0);
    let right = (0..width)
        .rev()
        .find(|x| !is_black(image.get_pixel(*x, row), threshold))
        .map(|x| x + 1)
        .unwrap_or(width);

    ContentBounds { left, right }
}

/// The crop to apply, or `None` when no meaningful border exists
pub fn crop_region(image: &DynamicImage, options: &TrimOptions) -> Option<ContentBounds> {
    let width = i64::from(image.width());
    let bounds = find_content_bounds(image, options.black_threshold);
    let new_width = bounds.width();

    if new_width <= 0 || new_width >= width - i64::from(options.border_tolerance) {
        return None;
    }
    Some(bounds)
}

/// Resolve a URI to a local path; only `file://` URIs and bare paths are
/// readable
pub fn local_path(uri: &str) -> std::result::Result<PathBuf, ImageError> {
    if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") {
        return Err(ImageError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

/// `dir/photo.png` becomes `photo{suffix}.png`; no extension means `jpg`
fn corrected_name(path: &Path, suffix: &str) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "jpg".to_string());
    (format!("{}{}.{}", stem, suffix, extension), extension)
}

/// Absolute directory for the corrected file, so the result is always a
/// well-formed `file://` URI
fn target_dir(source: &Path, options: &TrimOptions) -> std::io::Result<PathBuf> {
    let directory = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    if directory.is_absolute() {
        return Ok(directory);
    }
    let cwd = std::env::current_dir()?;
    if directory.as_os_str().is_empty() {
        Ok(cwd)
    } else {
        Ok(cwd.join(directory))
    }
}

/// Decode, crop and write one file; `Ok(None)` means nothing to trim
fn trim_file(
    source: &Path,
    options: &TrimOptions,
) -> std::result::Result<Option<PathBuf>, ImageError> {
    let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let (width, height) = image.dimensions();

    let Some(bounds) = crop_region(&image, options) else {
        debug!("No significant border in {}", source.display());
        return Ok(None);
    };
    info!(
        "Trimming {}: left={}, right={}, width {} -> {}",
        source.display(),
        bounds.left,
        bounds.right,
        width,
        bounds.width()
    );

    let cropped = image.crop_imm(bounds.left, 0, bounds.right - bounds.left, height);

    let directory = target_dir(source, options)?;
    std::fs::create_dir_all(&directory)?;

    let (file_name, extension) = corrected_name(source, &options.suffix);
    let target = directory.join(&file_name);
    if std::fs::canonicalize(&directory)?.join(&file_name) == std::fs::canonicalize(source)? {
        return Err(ImageError::WouldOverwrite(target));
    }
    let format = ImageFormat::from_extension(&extension).unwrap_or(ImageFormat::Jpeg);
    let cropped = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(cropped.to_rgb8()),
        _ => cropped,
    };

    // Encode into a temp file in the target directory, then move it into
    // place so a partial write never appears under the final name.
    let mut staging = NamedTempFile::new_in(&directory)?;
    cropped.write_to(staging.as_file_mut(), format)?;
    staging.persist(&target).map_err(|e| e.error)?;

    Ok(Some(target))
}

/// Clears the in-flight flag when the trim finishes, however it finishes
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ImageBorderTrimmer {
    options: TrimOptions,
    in_flight: Arc<AtomicBool>,
    events: Option<EventBus>,
}

impl Default for ImageBorderTrimmer {
    fn default() -> Self {
        Self::new(TrimOptions::default())
    }
}

impl ImageBorderTrimmer {
    pub fn new(mut options: TrimOptions) -> Self {
        if options.suffix.is_empty() {
            warn!("Empty corrected-file suffix, using {}", CORRECTED_SUFFIX);
            options.suffix = CORRECTED_SUFFIX.to_string();
        }
        Self {
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &TrimOptions {
        &self.options
    }

    fn try_acquire(&self) -> Result<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ImageError::Busy)?;
        Ok(InFlight(Arc::clone(&self.in_flight)))
    }

    /// Trim one image, returning the corrected URI or the original
    pub async fn process(&self, uri: &str) -> Result<String> {
        let _guard = self.try_acquire()?;
        Ok(self.trim_one(uri).await)
    }

    /// Trim each image in order, one at a time
    pub async fn process_list(&self, uris: &[String]) -> Result<Vec<String>> {
        let _guard = self.try_acquire()?;
        let mut processed = Vec::with_capacity(uris.len());
        for uri in uris {
            processed.push(self.trim_one(uri).await);
        }
        Ok(processed)
    }

    async fn trim_one(&self, uri: &str) -> String {
        match self.run_blocking(uri).await {
            Ok(Some(path)) => {
                let trimmed = format!("{}{}", FILE_SCHEME, path.display());
                info!("Image corrected and saved to {}", trimmed);
                if let Some(events) = &self.events {
                    events.emit(Event::ImageTrimmed {
                        original: uri.to_string(),
                        trimmed: trimmed.clone(),
                    });
                }
                trimmed
            }
            Ok(None) => uri.to_string(),
            Err(e) => {
                warn!("Could not correct image {}: {}", uri, e);
                if let Some(events) = &self.events {
                    events.emit(Event::ImageTrimFailed {
                        uri: uri.to_string(),
                        error: e.to_string(),
                    });
                }
                uri.to_string()
            }
        }
    }

    async fn run_blocking(&self, uri: &str) -> std::result::Result<Option<PathBuf>, ImageError> {
        let source = local_path(uri)?;
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || trim_file(&source, &options))
            .await
            .map_err(|e| ImageError::Worker(e.to_string()))?
    }
}
