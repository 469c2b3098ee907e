//! Decoded-image adapter for hashing: decode, bound to 512x512, expose sRGB
//! pixels.

use std::path::Path;

use image::{DynamicImage, ImageReader, RgbImage};
use thiserror::Error;

/// Bounding box the decoded image is downscaled into before hashing.
pub const DOWNSAMPLE_DIMS: u32 = 512;

/// Image-side failures, surfaced to the caller instead of aborting. Resize
/// and pixel access cannot fail with this adapter, so decode is the only
/// fallible stage after I/O.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// An image ready for hashing: decoded, proportionally downscaled to fit
/// within [`DOWNSAMPLE_DIMS`] (small images pass through unchanged), held as
/// an RGB8 plane. Orientation metadata is never applied.
#[derive(Debug)]
pub struct PdqImage {
    rgb: RgbImage,
}

impl PdqImage {
    pub fn open(path: &Path) -> Result<Self, ImageLoadError> {
        let reader = ImageReader::open(path).map_err(|source| ImageLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        // Sniff the format from content rather than trusting the extension.
        let reader = reader.with_guessed_format().map_err(|source| ImageLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_image(reader.decode()?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        Ok(Self::from_image(image::load_from_memory(bytes)?))
    }

    /// Wraps an already-decoded image, applying the downscale-only
    /// proportional thumbnail rule.
    pub fn from_image(image: DynamicImage) -> Self {
        let image = if image.width() > DOWNSAMPLE_DIMS || image.height() > DOWNSAMPLE_DIMS {
            image.thumbnail(DOWNSAMPLE_DIMS, DOWNSAMPLE_DIMS)
        } else {
            image
        };
        Self { rgb: image.into_rgb8() }
    }

    pub fn width(&self) -> usize {
        self.rgb.width() as usize
    }

    pub fn height(&self) -> usize {
        self.rgb.height() as usize
    }

    #[inline(always)]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.rgb.get_pixel(x, y).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30])))
    }

    #[test]
    fn test_small_image_passes_through() {
        let img = PdqImage::from_image(solid_image(100, 50));
        assert_eq!((100, 50), (img.width(), img.height()));
        assert_eq!([10, 20, 30], img.rgb(99, 49));
    }

    #[test]
    fn test_boundary_image_passes_through() {
        let img = PdqImage::from_image(solid_image(512, 512));
        assert_eq!((512, 512), (img.width(), img.height()));
    }

    #[test]
    fn test_large_image_downscales_proportionally() {
        let img = PdqImage::from_image(solid_image(1024, 512));
        assert_eq!((512, 256), (img.width(), img.height()));

        let img = PdqImage::from_image(solid_image(500, 1000));
        assert_eq!((256, 512), (img.width(), img.height()));
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut png = Vec::new();
        solid_image(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let img = PdqImage::from_bytes(&png).unwrap();
        assert_eq!((8, 8), (img.width(), img.height()));
        assert_eq!([10, 20, 30], img.rgb(0, 0));
    }

    #[test]
    fn test_decode_failure_is_typed() {
        let err = PdqImage::from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, ImageLoadError::Decode(_)));
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = PdqImage::open(Path::new("definitely-not-here.png")).unwrap_err();
        assert!(matches!(err, ImageLoadError::Io { .. }));
    }
}
