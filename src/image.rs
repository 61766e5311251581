//! Raster backend for artwork compositing.
//!
//! Base images are decoded with the `image` crate into a premultiplied
//! `tiny_skia` pixmap. Overlays are described as SVG and drawn on top of the
//! pixmap with `resvg`, which also provides text measurement through `usvg`.

use crate::errors::{DecodeError, RenderError};
use resvg::{tiny_skia, usvg};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Width of one character, in ems, when no font is available to measure with.
const FALLBACK_CHAR_WIDTH_EM: f32 = 0.6;

/// A decoded base image at its native resolution.
#[derive(Debug, Clone)]
pub struct BaseImage {
    pixmap: tiny_skia::Pixmap,
}

impl BaseImage {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// A fresh surface with the base image blitted at (0, 0).
    pub fn surface(&self) -> tiny_skia::Pixmap {
        self.pixmap.clone()
    }
}

/// Decodes PNG, JPEG, WebP or any other format the `image` crate detects.
pub fn decode_base_image(bytes: &[u8]) -> Result<BaseImage, DecodeError> {
    let decoded =
        ::image::load_from_memory(bytes).map_err(|e| DecodeError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(DecodeError::Dimensions { width, height })?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    Ok(BaseImage { pixmap })
}

/// Rendered size of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
}

/// SVG overlay rasterizer with font support.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    font_db: Arc<usvg::fontdb::Database>,
}

impl Rasterizer {
    #[instrument]
    pub fn new() -> Self {
        Self::with_font_dir(None)
    }

    /// Loads system fonts plus an optional extra directory.
    pub fn with_font_dir(font_dir: Option<&Path>) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();

        // Try multiple font paths for different environments
        let font_paths = ["assets/fonts", "fonts"];
        for path in &font_paths {
            if Path::new(path).exists() {
                fontdb.load_fonts_dir(path);
                break;
            }
        }

        if let Some(dir) = font_dir {
            fontdb.load_fonts_dir(dir);
        }

        tracing::debug!(faces = fontdb.len(), "Font database loaded");

        Self {
            font_db: Arc::new(fontdb),
        }
    }

    /// Measures bold text at the given size.
    ///
    /// Falls back to an estimate when no installed font can shape the text,
    /// so a missing font degrades the chip size instead of failing the render.
    pub fn measure_text(&self, text: &str, font_family: &str, font_size: f32) -> TextMetrics {
        let height = font_size;
        if text.is_empty() {
            return TextMetrics { width: 0.0, height };
        }

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"><text x="0" y="0" font-family="{}" font-size="{}" font-weight="bold">{}</text></svg>"#,
            escape_xml(&font_stack(font_family)),
            font_size,
            escape_xml(text)
        );

        let options = usvg::Options {
            fontdb: Arc::clone(&self.font_db),
            ..Default::default()
        };

        let measured = usvg::Tree::from_str(&svg, &options)
            .ok()
            .and_then(|tree| text_width(tree.root()));

        let width = measured.unwrap_or_else(|| {
            tracing::debug!(text, font_family, "No font could measure text, estimating width");
            text.chars().count() as f32 * font_size * FALLBACK_CHAR_WIDTH_EM
        });

        TextMetrics { width, height }
    }

    /// Draws an SVG document over the pixmap.
    #[instrument(skip(self, svg_data, pixmap))]
    pub fn render_overlay(
        &self,
        svg_data: &str,
        pixmap: &mut tiny_skia::Pixmap,
    ) -> Result<(), RenderError> {
        let start_time = std::time::Instant::now();

        let options = usvg::Options {
            fontdb: Arc::clone(&self.font_db),
            ..Default::default()
        };

        let tree = usvg::Tree::from_str(svg_data, &options)
            .map_err(|e| RenderError::SvgRendering(e.to_string()))?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();

        tracing::debug!(
            "Overlay rasterization completed in {}ms (output: {}x{})",
            duration_ms,
            pixmap.width(),
            pixmap.height()
        );

        if duration_ms > 1000 {
            tracing::warn!(
                "Overlay rasterization took {}ms (>1000ms) (output: {}x{})",
                duration_ms,
                pixmap.width(),
                pixmap.height()
            );
        }

        Ok(())
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

fn text_width(group: &usvg::Group) -> Option<f32> {
    group.children().iter().find_map(|node| match node {
        usvg::Node::Text(text) => Some(text.bounding_box().width()),
        usvg::Node::Group(group) => text_width(group),
        _ => None,
    })
}

/// Requested family followed by a generic fallback.
pub fn font_stack(font_family: &str) -> String {
    let family = font_family.trim();
    if family.is_empty() {
        "sans-serif".to_string()
    } else {
        format!("{}, sans-serif", family)
    }
}

/// Escapes text for use in SVG content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml(r#"<3 & "more""#), "&lt;3 &amp; &quot;more&quot;");
    }

    #[test]
    fn empty_family_uses_generic_font() {
        assert_eq!(font_stack("  "), "sans-serif");
        assert_eq!(font_stack("Arial"), "Arial, sans-serif");
    }
}
