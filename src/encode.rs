//! Image formats and the PNG encoder for rendered artwork.

use crate::errors::StorageError;
use resvg::tiny_skia;
use tracing::instrument;

/// Image formats coverstamp reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Get the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
        }
    }

    /// Guesses the format from an HTTP `Content-Type`, defaulting to PNG.
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("jpeg") || content_type.contains("jpg") {
            ImageFormat::Jpeg
        } else if content_type.contains("webp") {
            ImageFormat::WebP
        } else {
            ImageFormat::Png
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }
}

/// Encoder trait for rendered surfaces.
pub trait Encoder {
    /// Encodes the pixmap into the target format.
    fn encode(&self, pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, StorageError>;

    fn format(&self) -> ImageFormat;
}

/// Lossless PNG encoder using the `png` crate.
#[derive(Debug, Default)]
pub struct PngEncoder;

impl PngEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for PngEncoder {
    #[instrument(skip(self, pixmap), fields(width = pixmap.width(), height = pixmap.height()))]
    fn encode(&self, pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, StorageError> {
        // Pixmaps are premultiplied, PNG stores straight alpha.
        let mut data = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }

        let mut buffer = Vec::new();
        {
            let mut png_encoder = png::Encoder::new(&mut buffer, pixmap.width(), pixmap.height());
            png_encoder.set_color(png::ColorType::Rgba);
            png_encoder.set_depth(png::BitDepth::Eight);

            let mut png_writer = png_encoder
                .write_header()
                .map_err(|e| StorageError::PngWrite(e.to_string()))?;

            png_writer
                .write_image_data(&data)
                .map_err(|e| StorageError::PngWrite(e.to_string()))?;

            png_writer
                .finish()
                .map_err(|e| StorageError::PngWrite(e.to_string()))?;
        }

        Ok(buffer)
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }
}
