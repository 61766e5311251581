use coverstamp::errors::FeedError;
use coverstamp::feed::{parse_feed, FeedSource, HttpFeedSource};
use coverstamp::fetch::HTTP_CLIENT;
use tempfile::TempDir;

const FEED: &str = r#"{
    "title": "The Show",
    "artworkUrl": "https://img.test/cover.png",
    "episodes": [
        {
            "title": "Episode 2: Return",
            "guid": "ep-2",
            "number": 2,
            "season": "1",
            "publishedAt": "2024-03-02T10:00:00Z",
            "audioUrl": "https://audio.test/2.mp3"
        },
        { "title": "Trailer", "guid": "  " },
        { "guid": "ep-1", "number": " " }
    ]
}"#;

#[test]
fn test_parse_feed() {
    let feed = parse_feed("test", FEED.as_bytes()).unwrap();

    assert_eq!(feed.title, "The Show");
    assert_eq!(feed.artwork_url.as_deref(), Some("https://img.test/cover.png"));
    assert_eq!(feed.episodes.len(), 3);

    let first = &feed.episodes[0];
    assert_eq!(first.number(), Some("2"));
    assert_eq!(first.season.as_deref(), Some("1"));
    assert_eq!(first.guid(), Some("ep-2"));
    assert!(first.published_at.is_some());
    assert_eq!(first.audio_url.as_deref(), Some("https://audio.test/2.mp3"));

    assert_eq!(feed.episodes[1].guid(), None);
    assert_eq!(feed.episodes[2].number(), None);
    assert_eq!(feed.episodes[2].title_or_default(), "Untitled Episode");
}

#[tokio::test]
async fn test_feed_from_local_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feed.json");
    std::fs::write(&path, FEED).unwrap();
    let source = HttpFeedSource::new(HTTP_CLIENT.clone());

    let feed = source
        .fetch(&format!("file://{}", path.display()))
        .await
        .unwrap();
    assert_eq!(feed.episodes.len(), 3);

    let feed = source.fetch(path.to_str().unwrap()).await.unwrap();
    assert_eq!(feed.title, "The Show");
}

#[tokio::test]
async fn test_feed_errors() {
    let dir = TempDir::new().unwrap();
    let source = HttpFeedSource::new(HTTP_CLIENT.clone());

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        source.fetch(missing.to_str().unwrap()).await,
        Err(FeedError::Network { .. })
    ));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "<rss></rss>").unwrap();
    assert!(matches!(
        source.fetch(broken.to_str().unwrap()).await,
        Err(FeedError::Parse { .. })
    ));
}
