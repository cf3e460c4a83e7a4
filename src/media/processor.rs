/// Photo processing: one source image in, a full image and a thumbnail out
///
/// Both outputs are re-encoded as JPEG. The full image is capped to
/// `max_dimension` on its longest side and the thumbnail fits inside a
/// `thumbnail_size` square; neither is ever upscaled.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};

/// Output of the image processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub image_blob: Vec<u8>,
    pub thumbnail_blob: Vec<u8>,
}

/// Turns a user-supplied image into the two blobs stored with a photo
pub trait ImageProcessor {
    /// Fails with `UnsupportedFormat` if `source` cannot be decoded
    fn process(&self, source: &[u8]) -> Result<ProcessedImage>;
}

#[derive(Debug, Clone, Copy)]
pub struct JpegProcessor {
    pub max_dimension: u32,
    pub thumbnail_size: u32,
    pub quality: u8,
}

impl Default for JpegProcessor {
    fn default() -> Self {
        Self::from_config(&InventoryConfig::default())
    }
}

impl JpegProcessor {
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self {
            max_dimension: config.max_image_dimension,
            thumbnail_size: config.thumbnail_size,
            quality: config.jpeg_quality,
        }
    }
}

impl ImageProcessor for JpegProcessor {
    fn process(&self, source: &[u8]) -> Result<ProcessedImage> {
        let img = image::load_from_memory(source)
            .map_err(|e| InventoryError::UnsupportedFormat(e.to_string()))?;

        tracing::debug!("decoded source image {}x{}", img.width(), img.height());

        let full = fit_within(&img, self.max_dimension);
        let thumb = fit_within(&img, self.thumbnail_size);

        Ok(ProcessedImage {
            image_blob: encode_jpeg(&full, self.quality)?,
            thumbnail_blob: encode_jpeg(&thumb, self.quality)?,
        })
    }
}

/// Downscale so both sides are at most `bound`, keeping the aspect ratio
fn fit_within(img: &DynamicImage, bound: u32) -> DynamicImage {
    if img.width() <= bound && img.height() <= bound {
        img.clone()
    } else {
        img.resize(bound, bound, FilterType::Lanczos3)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| InventoryError::UnsupportedFormat(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}

/// Run the processor on a blocking thread, it is CPU-bound
pub async fn process_in_background<P>(processor: Arc<P>, source: Vec<u8>) -> Result<ProcessedImage>
where
    P: ImageProcessor + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || processor.process(&source))
        .await
        .map_err(|e| {
            InventoryError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Task join error: {}", e),
            ))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        assert_eq!(image::guess_format(bytes).unwrap(), ImageFormat::Jpeg);
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let processor = JpegProcessor::default();
        let out = processor.process(&png(3840, 1920)).unwrap();

        assert_eq!(decode(&out.image_blob).dimensions(), (1920, 960));
        assert_eq!(decode(&out.thumbnail_blob).dimensions(), (256, 128));
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let processor = JpegProcessor::default();
        let out = processor.process(&png(100, 40)).unwrap();

        assert_eq!(decode(&out.image_blob).dimensions(), (100, 40));
        assert_eq!(decode(&out.thumbnail_blob).dimensions(), (100, 40));
    }

    #[test]
    fn test_undecodable_input() {
        let err = JpegProcessor::default().process(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InventoryError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_process_in_background() {
        let processor = Arc::new(JpegProcessor {
            max_dimension: 64,
            thumbnail_size: 16,
            quality: 70,
        });
        let out = process_in_background(processor, png(128, 128)).await.unwrap();
        assert_eq!(decode(&out.image_blob).dimensions(), (64, 64));
        assert_eq!(decode(&out.thumbnail_blob).dimensions(), (16, 16));
    }
}
