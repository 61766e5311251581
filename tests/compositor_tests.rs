use async_trait::async_trait;
use coverstamp::compositor::{artwork_key, render_png, ArtworkCompositor, EpisodeInput};
use coverstamp::errors::{CoverstampError, DecodeError};
use coverstamp::fetch::{FetchedImage, HttpImageSource, ImageSource};
use coverstamp::image::{decode_base_image, Rasterizer};
use coverstamp::storage::FsBlobStore;
use coverstamp::style::{Position, StyleConfig};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const PUBLIC_URL: &str = "https://cdn.test";

fn white_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Serves the same bytes for every handle and counts fetches.
struct StaticSource {
    bytes: Vec<u8>,
    fetches: AtomicUsize,
}

impl StaticSource {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageSource for StaticSource {
    async fn fetch(&self, _handle: &str) -> Result<FetchedImage, DecodeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedImage {
            bytes: self.bytes.clone(),
            content_type: "image/png".to_string(),
        })
    }
}

fn compositor(source: Arc<dyn ImageSource>, dir: &TempDir) -> ArtworkCompositor {
    let store = Arc::new(FsBlobStore::new(dir.path(), Some(PUBLIC_URL.to_string())));
    ArtworkCompositor::new(source, store, Rasterizer::new())
}

fn read_stored(dir: &Path, url: &str) -> image::RgbaImage {
    let key = url.strip_prefix(&format!("{}/", PUBLIC_URL)).unwrap();
    let bytes = std::fs::read(dir.join(key)).unwrap();
    image::load_from_memory(&bytes).unwrap().to_rgba8()
}

fn solid_chip_style() -> StyleConfig {
    StyleConfig {
        position: Position::TopLeft,
        font_size: 20.0,
        background_color: "black".to_string(),
        background_opacity: 1.0,
        corner_radius: 0.0,
        show_navigation: false,
        ..StyleConfig::default()
    }
}

#[tokio::test]
async fn test_composite_draws_chip_at_native_resolution() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new(white_png(600, 600)));
    let compositor = compositor(source, &dir);

    let url = compositor
        .composite("base.png", &EpisodeInput::new("ep-1", "7", false), &solid_chip_style())
        .await
        .unwrap();

    assert!(url.starts_with("https://cdn.test/artwork/episode-7-"));
    assert!(url.ends_with(".png"));

    let rendered = read_stored(dir.path(), &url);
    assert_eq!(rendered.dimensions(), (600, 600));

    // Chip spans 15..65 vertically and starts at x = 15.
    assert_eq!(rendered.get_pixel(20, 60).0, [0, 0, 0, 255]);
    assert_eq!(rendered.get_pixel(590, 590).0, [255, 255, 255, 255]);
    assert_eq!(rendered.get_pixel(5, 5).0, [255, 255, 255, 255]);
}

#[tokio::test]
async fn test_composite_keeps_base_dimensions() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new(white_png(320, 180)));
    let compositor = compositor(source, &dir);

    let url = compositor
        .composite("wide.png", &EpisodeInput::new("ep-1", "1", false), &StyleConfig::default())
        .await
        .unwrap();

    assert_eq!(read_stored(dir.path(), &url).dimensions(), (320, 180));
}

#[tokio::test]
async fn test_base_image_is_decoded_once() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new(white_png(100, 100)));
    let compositor = compositor(Arc::clone(&source) as Arc<dyn ImageSource>, &dir);
    let style = StyleConfig::default();

    for number in ["1", "2", "3"] {
        compositor
            .composite("base.png", &EpisodeInput::new(number, number, false), &style)
            .await
            .unwrap();
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

    compositor.invalidate_base_images();
    compositor
        .composite("base.png", &EpisodeInput::new("4", "4", false), &style)
        .await
        .unwrap();
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_color_fails_before_fetching() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new(white_png(10, 10)));
    let compositor = compositor(Arc::clone(&source) as Arc<dyn ImageSource>, &dir);

    let style = StyleConfig {
        text_color: "#12345".to_string(),
        ..StyleConfig::default()
    };
    let result = compositor
        .composite("base.png", &EpisodeInput::new("ep-1", "1", false), &style)
        .await;

    assert!(matches!(result, Err(CoverstampError::Configuration(_))));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_corrupt_base_image_is_decode_error() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(StaticSource::new(b"definitely not an image".to_vec()));
    let compositor = compositor(source, &dir);

    let result = compositor
        .composite("base.png", &EpisodeInput::new("ep-1", "1", false), &StyleConfig::default())
        .await;

    assert!(matches!(result, Err(CoverstampError::ImageDecode(_))));
}

#[tokio::test]
async fn test_missing_local_base_image_is_decode_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.png");
    let compositor = compositor(Arc::new(HttpImageSource::default()), &dir);

    let result = compositor
        .composite(
            missing.to_str().unwrap(),
            &EpisodeInput::new("ep-1", "1", false),
            &StyleConfig::default(),
        )
        .await;

    assert!(matches!(
        result,
        Err(CoverstampError::ImageDecode(DecodeError::Fetch { .. }))
    ));
}

#[tokio::test]
async fn test_local_base_image_from_disk() {
    let dir = TempDir::new().unwrap();
    let base_path = dir.path().join("base.png");
    std::fs::write(&base_path, white_png(64, 64)).unwrap();
    let compositor = compositor(Arc::new(HttpImageSource::default()), &dir);

    let url = compositor
        .composite(
            &format!("file://{}", base_path.display()),
            &EpisodeInput::new("ep-1", "12", true),
            &StyleConfig::default(),
        )
        .await
        .unwrap();

    assert!(url.contains("/artwork/episode-12-"));
}

#[test]
fn test_render_png_is_deterministic() {
    let base = decode_base_image(&white_png(120, 120)).unwrap();
    let rasterizer = Rasterizer::new();
    let episode = EpisodeInput::new("ep-1", "42", false);
    let style = StyleConfig::default();

    let first = render_png(&rasterizer, &base, &episode, &style).unwrap();
    let second = render_png(&rasterizer, &base, &episode, &style).unwrap();

    assert_eq!(first, second);
    assert_eq!(artwork_key("42", &first), artwork_key("42", &second));
}

#[test]
fn test_different_styles_get_different_keys() {
    let base = decode_base_image(&white_png(120, 120)).unwrap();
    let rasterizer = Rasterizer::new();
    let episode = EpisodeInput::new("ep-1", "42", false);

    let dark = render_png(&rasterizer, &base, &episode, &StyleConfig::default()).unwrap();
    let red = render_png(
        &rasterizer,
        &base,
        &episode,
        &StyleConfig {
            background_color: "red".to_string(),
            ..StyleConfig::default()
        },
    )
    .unwrap();

    assert_ne!(artwork_key("42", &dark), artwork_key("42", &red));
}

#[test]
fn test_transparent_chip_leaves_background_untouched() {
    let base = decode_base_image(&white_png(200, 200)).unwrap();
    let style = StyleConfig {
        background_opacity: 0.0,
        text_color: "black".to_string(),
        ..solid_chip_style()
    };

    let png = render_png(&Rasterizer::new(), &base, &EpisodeInput::new("e", "1", false), &style).unwrap();
    let rendered = image::load_from_memory(&png).unwrap().to_rgba8();

    // Inside where the chip padding would be, left of the text.
    assert_eq!(rendered.get_pixel(7, 12).0, [255, 255, 255, 255]);
}
