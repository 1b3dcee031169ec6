//! Preview transcoder.
//!
//! Decodes an arbitrary raster image, flattens any transparency onto white and
//! writes the result as a JPEG next to the other cached previews.
//!
//! # Design Decisions
//!
//! - **No pixel limit**: generated images can be far larger than the decoder's
//!   default allocation limits, so limits are switched off. The preview
//!   service bounds memory instead by capping how many transcodes run at once.
//!
//! - **Optimized Huffman tables**: previews are encoded with per-image
//!   Huffman tables, which never produce a larger file than the standard
//!   tables at the same quality.
//!
//! - **Flatten, don't drop**: JPEG has no alpha channel. Translucent pixels are
//!   blended against an opaque white canvas; fully opaque pixels are unchanged.
//!
//! - **Atomic output**: the encoder streams into a temporary file in the
//!   destination directory which is renamed into place only after the encode
//!   succeeded. A failed transcode never leaves a partial artifact behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, ImageReader, Rgb, RgbImage, Rgba};
use jpeg_encoder::{ColorType, Encoder};
use tracing::debug;

use crate::error::TranscodeError;

/// Default JPEG quality for previews (1-100).
pub const DEFAULT_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_QUALITY: u8 = 100;

// =============================================================================
// Transcoder Trait
// =============================================================================

/// Produces a derived artifact from a source image.
///
/// Implementations are synchronous and may be CPU-heavy; the preview service
/// always calls them from a blocking worker thread.
pub trait Transcoder: Send + Sync + 'static {
    /// Read `source`, write a normalized preview to `dest` at `quality`.
    ///
    /// On error `dest` must be left untouched.
    fn transcode(&self, source: &Path, dest: &Path, quality: u8) -> Result<(), TranscodeError>;
}

// =============================================================================
// JPEG Transcoder
// =============================================================================

/// Transcoder writing opaque baseline JPEGs.
#[derive(Debug, Clone)]
pub struct JpegTranscoder {
    /// Build per-image Huffman tables instead of the standard ones
    optimize_huffman: bool,
}

impl Default for JpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegTranscoder {
    /// Create a transcoder with size optimization enabled.
    pub fn new() -> Self {
        Self {
            optimize_huffman: true,
        }
    }

    /// Enable or disable optimized Huffman tables.
    pub fn with_optimized_huffman(mut self, enabled: bool) -> Self {
        self.optimize_huffman = enabled;
        self
    }

    pub fn optimize_huffman(&self) -> bool {
        self.optimize_huffman
    }

    /// Decode an image file in any supported format.
    ///
    /// The format is sniffed from the content, falling back to the extension.
    pub fn decode(&self, source: &Path) -> Result<DynamicImage, TranscodeError> {
        let read_error = |e: std::io::Error| TranscodeError::Read {
            path: source.display().to_string(),
            message: e.to_string(),
        };

        let mut reader = ImageReader::open(source)
            .map_err(read_error)?
            .with_guessed_format()
            .map_err(read_error)?;
        reader.no_limits();

        reader.decode().map_err(|e| TranscodeError::Decode {
            path: source.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Encode `image` as JPEG into `dest` via a temporary sibling file.
    pub fn write_jpeg(
        &self,
        image: &RgbImage,
        dest: &Path,
        quality: u8,
    ) -> Result<(), TranscodeError> {
        let write_error = |e: std::io::Error| TranscodeError::Write {
            path: dest.display().to_string(),
            message: e.to_string(),
        };

        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(write_error)?;

        let mut staging = tempfile::Builder::new()
            .prefix(".minify-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(write_error)?;

        let (width, height) = image.dimensions();
        let (width, height) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(TranscodeError::Encode {
                    message: format!("{}x{} exceeds the JPEG size limit", width, height),
                })
            }
        };

        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            let mut encoder = Encoder::new(&mut writer, clamp_quality(quality));
            encoder.set_optimized_huffman_tables(self.optimize_huffman);
            encoder
                .encode(image.as_raw(), width, height, ColorType::Rgb)
                .map_err(|e| TranscodeError::Encode {
                    message: e.to_string(),
                })?;
            writer.flush().map_err(write_error)?;
        }

        staging.persist(dest).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

impl Transcoder for JpegTranscoder {
    fn transcode(&self, source: &Path, dest: &Path, quality: u8) -> Result<(), TranscodeError> {
        let started_at = Instant::now();

        let decoded = self.decode(source)?;
        let (width, height) = (decoded.width(), decoded.height());
        let had_alpha = decoded.color().has_alpha();

        let flattened = flatten_onto_white(decoded);
        self.write_jpeg(&flattened, dest, quality)?;

        debug!(
            source = %source.display(),
            dest = %dest.display(),
            width,
            height,
            had_alpha,
            quality,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Transcoded preview"
        );

        Ok(())
    }
}

// =============================================================================
// Pixel Normalization
// =============================================================================

/// Convert to 8-bit RGB, compositing any alpha channel over white.
///
/// Palette images arrive here already expanded by the decoder, so they take
/// the alpha path when their palette carries transparency.
pub fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut canvas = RgbImage::new(width, height);

    for (dst, src) in canvas.pixels_mut().zip(rgba.pixels()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
    }

    canvas
}

#[inline]
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
