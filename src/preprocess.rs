//! Image preparation for the vision model upload.
//!
//! Camera photos arrive large, rotated, and in whatever format the platform
//! produced. The preprocessor normalizes them once per image: validate bytes,
//! decode, fix EXIF orientation, fit into a model square with padding, and
//! re-encode as JPEG to keep the upload small. The result is cached by
//! fingerprint so a repeat analysis within a session skips the transform.
//!
//! Formats the local decoder lacks (e.g. HEIC) still decode provider-side, so
//! decode failure degrades to a raw-bytes passthrough tagged with the
//! caller-resolved MIME type instead of failing the request.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Maximum input size before rejecting. Prevents OOM on corrupt files.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024; // 20 MB

/// Smallest plausible image file (a minimal valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

const JPEG_MIME: &str = "image/jpeg";
const FALLBACK_MIME: &str = "application/octet-stream";

/// Failures that survive even the passthrough fallback.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image data too small to be a valid image")]
    TooSmall,
    #[error("image data exceeds {0} MB limit")]
    TooLarge(usize),
    #[error("image encoding failed: {0}")]
    Encode(String),
}

/// Normalized upload artifact.
///
/// `content_*` are the image dimensions inside the padded square; zero for a
/// passthrough artifact whose dimensions were never decoded locally.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub original_width: u32,
    pub original_height: u32,
    pub content_width: u32,
    pub content_height: u32,
}

/// Pure image-to-upload transform — no I/O, no model calls.
pub trait ImagePreprocessor: Send + Sync {
    /// Prepare raw image bytes for the gateway.
    ///
    /// `mime_hint` is the caller-resolved MIME type of the original bytes,
    /// used only when the local decoder cannot handle the format.
    fn prepare(
        &self,
        raw_bytes: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<PreparedImage, PreprocessError>;
}

/// Production preprocessor: decode → orient → fit + pad → JPEG.
pub struct StandardPreprocessor {
    target_size: u32,
    jpeg_quality: u8,
}

impl StandardPreprocessor {
    pub fn new(target_size: u32, jpeg_quality: u8) -> Self {
        Self {
            target_size,
            jpeg_quality,
        }
    }

    pub fn from_config(config: &crate::config::AnalysisConfig) -> Self {
        Self::new(config.target_image_size, config.jpeg_quality)
    }
}

impl Default for StandardPreprocessor {
    fn default() -> Self {
        Self::new(768, 85)
    }
}

impl ImagePreprocessor for StandardPreprocessor {
    fn prepare(
        &self,
        raw_bytes: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<PreparedImage, PreprocessError> {
        validate_image_bytes(raw_bytes)?;

        let img = match image::load_from_memory(raw_bytes) {
            Ok(img) => img,
            Err(e) => {
                // Ship the original bytes; the provider decodes formats we can't.
                debug!(error = %e, "local decode failed; passing original bytes through");
                return Ok(PreparedImage {
                    bytes: raw_bytes.to_vec(),
                    mime_type: mime_hint.unwrap_or(FALLBACK_MIME).to_string(),
                    original_width: 0,
                    original_height: 0,
                    content_width: 0,
                    content_height: 0,
                });
            }
        };
        let (orig_w, orig_h) = img.dimensions();

        let img = apply_orientation(img, read_exif_orientation(raw_bytes));
        let rgb = img.to_rgb8();

        let (w, h) = (rgb.width(), rgb.height());
        let (content_w, content_h) = compute_fit_dimensions(w, h, self.target_size);
        let resized = image::imageops::resize(&rgb, content_w, content_h, FilterType::Triangle);

        let mut canvas =
            RgbImage::from_pixel(self.target_size, self.target_size, Rgb([255, 255, 255]));
        let offset_x = (self.target_size - content_w) / 2;
        let offset_y = (self.target_size - content_h) / 2;
        image::imageops::overlay(&mut canvas, &resized, offset_x, offset_y);

        let bytes = encode_jpeg(&canvas, self.jpeg_quality)?;
        debug!(
            original = format!("{orig_w}x{orig_h}"),
            content = format!("{content_w}x{content_h}"),
            upload_size = bytes.len(),
            "image prepared for upload"
        );

        Ok(PreparedImage {
            bytes,
            mime_type: JPEG_MIME.to_string(),
            original_width: orig_w,
            original_height: orig_h,
            content_width: content_w,
            content_height: content_h,
        })
    }
}

/// Validate image bytes before decoding. Cheap rejection of clearly invalid
/// input saves the decode attempt.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), PreprocessError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PreprocessError::TooSmall);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PreprocessError::TooLarge(MAX_IMAGE_BYTES / (1024 * 1024)));
    }
    Ok(())
}

/// Read the EXIF orientation tag (0x0112) from raw image bytes.
/// Returns 1 (normal) when no EXIF data or tag is present.
fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };
    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply an EXIF orientation transform.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        1 => img,
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Dimensions that fit inside a square while preserving aspect ratio.
/// Small images are not upscaled.
fn compute_fit_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let scale = (target_size as f32 / width as f32)
        .min(target_size as f32 / height as f32)
        .min(1.0);
    let new_w = ((width as f32 * scale).round() as u32).max(1).min(target_size);
    let new_h = ((height as f32 * scale).round() as u32).max(1).min(target_size);
    (new_w, new_h)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Mock preprocessor for tests — echoes a tiny fixed artifact.
pub struct MockPreprocessor {
    fail: bool,
}

impl MockPreprocessor {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreprocessor for MockPreprocessor {
    fn prepare(
        &self,
        raw_bytes: &[u8],
        _mime_hint: Option<&str>,
    ) -> Result<PreparedImage, PreprocessError> {
        if self.fail {
            return Err(PreprocessError::Encode("mock preprocessing failure".into()));
        }
        Ok(PreparedImage {
            bytes: raw_bytes.to_vec(),
            mime_type: JPEG_MIME.to_string(),
            original_width: 64,
            original_height: 64,
            content_width: 64,
            content_height: 64,
        })
    }
}
