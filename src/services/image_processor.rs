// src/services/image_processor.rs
use crate::errors::EcoVisionError;
use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, RgbImage};
use std::borrow::Cow;

pub const JPEG_QUALITY: u8 = 85;

/// A decoded bitmap as received from the user.
#[derive(Debug, Clone)]
pub struct RawImage {
    image: DynamicImage,
}

impl RawImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn color(&self) -> ColorType {
        self.image.color()
    }
}

/// Base64 JPEG, ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.0)
    }
}

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, data: &[u8]) -> Result<RawImage, EcoVisionError> {
        if data.is_empty() {
            return Err(EcoVisionError::Validation(
                "Uploaded image is empty".to_string(),
            ));
        }

        let img = image::load_from_memory(data)
            .map_err(|e| EcoVisionError::Validation(format!("Invalid image format: {}", e)))?;

        Ok(RawImage::new(img))
    }

    /// Normalizes to 8-bit RGB, writes a JPEG at [`JPEG_QUALITY`] and
    /// base64-encodes it.
    pub fn encode(&self, image: &RawImage) -> Result<EncodedImage, EcoVisionError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EcoVisionError::Encoding(format!(
                "Cannot encode an image of size {}x{}",
                width, height
            )));
        }

        let rgb: Cow<'_, RgbImage> = match &image.image {
            DynamicImage::ImageRgb8(buf) => Cow::Borrowed(buf),
            other => Cow::Owned(other.to_rgb8()),
        };

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY)
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| EcoVisionError::Encoding(format!("Failed to write JPEG: {}", e)))?;

        let encoded = general_purpose::STANDARD.encode(&output);
        log::debug!(
            "Encoded {}x{} image ({:?}) into {} base64 chars",
            width,
            height,
            image.color(),
            encoded.len()
        );

        Ok(EncodedImage(encoded))
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}
