//! Artwork compositing: base image in, published PNG URL out.
//!
//! One compositing call validates the style, loads the base image (decoded
//! once per handle and cached), draws the badge and the navigation caption at
//! the base image's native resolution, encodes PNG and hands the bytes to the
//! blob store.

use crate::badge::{layout_badge, Badge};
use crate::batch::ArtworkRenderer;
use crate::encode::{Encoder, ImageFormat, PngEncoder};
use crate::errors::{DecodeError, RenderError, Result};
use crate::fetch::ImageSource;
use crate::image::{decode_base_image, BaseImage, Rasterizer};
use crate::label::format_label;
use crate::layout::{self, chip_padding};
use crate::navigation::{layout_caption, Caption};
use crate::storage::BlobStore;
use crate::style::StyleConfig;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// The per-episode input to a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInput {
    /// Stable episode id.
    pub id: String,
    /// Display number, rendered verbatim.
    pub number: String,
    pub bonus: bool,
}

impl EpisodeInput {
    pub fn new(id: impl Into<String>, number: impl Into<String>, bonus: bool) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            bonus,
        }
    }
}

/// Renders episode artwork and publishes it through a [`BlobStore`].
pub struct ArtworkCompositor {
    source: Arc<dyn ImageSource>,
    store: Arc<dyn BlobStore>,
    rasterizer: Rasterizer,
    base_images: Cache<String, Arc<BaseImage>>,
}

impl ArtworkCompositor {
    pub fn new(
        source: Arc<dyn ImageSource>,
        store: Arc<dyn BlobStore>,
        rasterizer: Rasterizer,
    ) -> Self {
        let base_images = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(30 * 60))
            .build();

        Self {
            source,
            store,
            rasterizer,
            base_images,
        }
    }

    /// Renders the artwork for one episode and returns its public URL.
    ///
    /// # Errors
    ///
    /// Configuration errors (invalid colors) are reported before the base
    /// image is touched. Fetch and decode failures are image decode errors;
    /// encoding and upload failures are storage errors.
    #[instrument(skip(self, style), fields(episode = %episode.id, number = %episode.number))]
    pub async fn composite(
        &self,
        base_image: &str,
        episode: &EpisodeInput,
        style: &StyleConfig,
    ) -> Result<String> {
        let start_time = std::time::Instant::now();

        let style = style.normalized();
        style.colors()?;

        let base = self.load_base(base_image).await?;

        let rasterizer = self.rasterizer.clone();
        let input = episode.clone();
        let png = tokio::task::spawn_blocking(move || render_png(&rasterizer, &base, &input, &style))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;

        let key = artwork_key(&episode.number, &png);
        let stored = self
            .store
            .put(&key, png, ImageFormat::Png.mime_type())
            .await?;

        let duration_ms = start_time.elapsed().as_millis();
        debug!(key = %stored.key, url = %stored.url, "Artwork generated in {}ms", duration_ms);
        if duration_ms > 1000 {
            warn!(key = %stored.key, "Slow artwork generation: {}ms (>1000ms)", duration_ms);
        }

        Ok(stored.url)
    }

    /// Decoded base image for a handle, fetched and decoded at most once
    /// while cached. Failures are not cached.
    async fn load_base(&self, handle: &str) -> std::result::Result<Arc<BaseImage>, DecodeError> {
        if let Some(base) = self.base_images.get(handle).await {
            debug!(handle, "Base image cache hit");
            return Ok(base);
        }

        let source = Arc::clone(&self.source);
        let owned = handle.to_string();
        self.base_images
            .try_get_with(handle.to_string(), async move {
                let fetched = source.fetch(&owned).await?;
                let base = tokio::task::spawn_blocking(move || decode_base_image(&fetched.bytes))
                    .await
                    .map_err(|e| DecodeError::Decode(e.to_string()))??;
                debug!(handle = %owned, width = base.width(), height = base.height(), "Decoded base image");
                Ok::<_, DecodeError>(Arc::new(base))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drops every cached base image.
    pub fn invalidate_base_images(&self) {
        self.base_images.invalidate_all();
    }
}

#[async_trait]
impl ArtworkRenderer for ArtworkCompositor {
    async fn render(
        &self,
        base_image: &str,
        episode: &EpisodeInput,
        style: &StyleConfig,
    ) -> Result<String> {
        self.composite(base_image, episode, style).await
    }
}

/// Draws the badge and navigation caption over the base image and encodes
/// the result as PNG.
pub fn render_png(
    rasterizer: &Rasterizer,
    base: &BaseImage,
    episode: &EpisodeInput,
    style: &StyleConfig,
) -> Result<Vec<u8>> {
    let style = style.normalized();
    let colors = style.colors()?;
    let (width, height) = (base.width(), base.height());

    let label = format_label(&episode.number, episode.bonus, &style);
    let anchor = layout::resolve(width, height, style.position, style.custom_position);
    let badge = layout_badge(
        rasterizer,
        label,
        anchor,
        &style,
        colors,
        chip_padding(width, height),
    );
    let caption = layout_caption(width, height, &style, colors.text);

    let mut surface = base.surface();
    rasterizer.render_overlay(&overlay_svg(width, height, &badge, caption.as_ref()), &mut surface)?;

    Ok(PngEncoder::new().encode(&surface)?)
}

fn overlay_svg(width: u32, height: u32, badge: &Badge, caption: Option<&Caption>) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    svg.push_str(&badge.to_svg());
    if let Some(caption) = caption {
        svg.push_str(&caption.to_svg());
    }
    svg.push_str("</svg>");
    svg
}

/// Object key for rendered artwork: the episode number plus a content hash,
/// so re-renders with a different style never overwrite a URL in use.
pub fn artwork_key(number: &str, png: &[u8]) -> String {
    let digest = sha256::digest(png);
    format!("artwork/episode-{}-{}.png", sanitize_number(number), &digest[..16])
}

fn sanitize_number(number: &str) -> String {
    let sanitized: String = number
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "unnumbered".to_string()
    } else {
        sanitized
    }
}
