#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::http::StatusCode;
use coverstamp::batch::{ArtworkRenderer, BatchOptions};
use coverstamp::compositor::EpisodeInput;
use coverstamp::errors::{
    ConfigError, CoverstampError, DecodeError, FeedError, Result, ServerError, StorageError,
};
use coverstamp::feed::{Feed, FeedSource};
use coverstamp::fetch::{FetchedImage, ImageSource};
use coverstamp::server::{parse_address, router};
use coverstamp::service::{ArtworkService, Stores};
use coverstamp::storage::FsBlobStore;
use coverstamp::store::{Episode, JsonStore};
use coverstamp::style::StyleConfig;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tempfile::TempDir;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

#[test]
fn test_parse_address() {
    let test_cases = [
        ("", "127.0.0.1:8080"),
        ("  ", "127.0.0.1:8080"),
        ("0.0.0.0:3000", "0.0.0.0:3000"),
        ("0.0.0.0", "0.0.0.0:8080"),
        ("9000", "127.0.0.1:9000"),
        (":9001", "127.0.0.1:9001"),
        ("[::1]:4000", "[::1]:4000"),
        ("::1", "[::1]:8080"),
    ];

    for (input, expected) in test_cases {
        let addr = parse_address(input, LOCALHOST, 8080).unwrap();
        assert_eq!(addr, expected.parse::<SocketAddr>().unwrap(), "parsing {:?}", input);
    }
}

#[test]
fn test_parse_invalid_address() {
    for input in ["localhost:abc", "99999", "not an address"] {
        assert!(matches!(
            parse_address(input, LOCALHOST, 8080),
            Err(ServerError::InvalidAddress(_))
        ));
    }
}

#[test]
fn test_error_status_codes() {
    let test_cases = [
        (
            CoverstampError::Configuration(ConfigError::InvalidColor("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (CoverstampError::NotFound("episode".into()), StatusCode::NOT_FOUND),
        (
            CoverstampError::ImageDecode(DecodeError::Decode("bad".into())),
            StatusCode::BAD_GATEWAY,
        ),
        (
            CoverstampError::FeedFetch(FeedError::Status {
                url: "u".into(),
                status: 500,
            }),
            StatusCode::BAD_GATEWAY,
        ),
        (
            CoverstampError::Storage(StorageError::Rejected("k".into())),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            CoverstampError::Storage(StorageError::PngWrite("w".into())),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (CoverstampError::BatchRunning("p".into()), StatusCode::CONFLICT),
        (
            CoverstampError::Server(ServerError::InvalidRequest("json".into())),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (error, expected) in test_cases {
        assert_eq!(StatusCode::from(&error), expected, "{}", error);
    }
}

struct NoFeeds;

#[async_trait]
impl FeedSource for NoFeeds {
    async fn fetch(&self, url: &str) -> std::result::Result<Feed, FeedError> {
        Err(FeedError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

struct NoImages;

#[async_trait]
impl ImageSource for NoImages {
    async fn fetch(&self, handle: &str) -> std::result::Result<FetchedImage, DecodeError> {
        Err(DecodeError::Status {
            url: handle.to_string(),
            status: 404,
        })
    }
}

struct EchoRenderer;

#[async_trait]
impl ArtworkRenderer for EchoRenderer {
    async fn render(
        &self,
        _base_image: &str,
        episode: &EpisodeInput,
        _style: &StyleConfig,
    ) -> Result<String> {
        Ok(format!("https://cdn.test/{}.png", episode.number))
    }
}

struct TestServer {
    _dir: TempDir,
    base_url: String,
    service: Arc<ArtworkService>,
    client: reqwest::Client,
}

async fn spawn_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let stores = Stores::json(Arc::new(JsonStore::new(dir.path())));
    let service = Arc::new(ArtworkService::new(
        stores,
        Arc::new(EchoRenderer),
        Arc::new(NoImages),
        Arc::new(FsBlobStore::new(dir.path().join("public"), None)),
        Arc::new(NoFeeds),
        BatchOptions::default(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::clone(&service));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        _dir: dir,
        base_url: format!("http://{}", addr),
        service,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = spawn_server().await;

    let response = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let header = response
        .headers()
        .get(reqwest::header::SERVER)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(header.starts_with("coverstamp/"));
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_unknown_episode_is_404() {
    let server = spawn_server().await;

    let response = server
        .client
        .post(format!("{}/episodes/missing/artwork", server.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_generate_single_over_http() {
    let server = spawn_server().await;
    let stores = server.service.stores().clone();
    let project = stores.projects.create_project("Show").await.unwrap();
    server
        .service
        .set_base_artwork(&project.id, "base.png")
        .await
        .unwrap();

    let episode = Episode {
        number: Some("8".to_string()),
        ..Episode::new(&project.id, "Eight")
    };
    stores
        .episodes
        .insert_episodes(&project.id, vec![episode.clone()])
        .await
        .unwrap();

    let response = server
        .client
        .post(format!("{}/episodes/{}/artwork", server.base_url, episode.id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["url"], "https://cdn.test/8.png");
}

#[tokio::test]
async fn test_batch_endpoints() {
    let server = spawn_server().await;
    let stores = server.service.stores().clone();
    let project = stores.projects.create_project("Show").await.unwrap();

    let progress_url = format!("{}/projects/{}/artwork/progress", server.base_url, project.id);
    let batch_url = format!("{}/projects/{}/artwork", server.base_url, project.id);

    let response = server.client.get(&progress_url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // No base artwork yet.
    let response = server.client.post(&batch_url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .client
        .post(&batch_url)
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    server
        .service
        .set_base_artwork(&project.id, "base.png")
        .await
        .unwrap();
    let episodes: Vec<Episode> = ["1", "2"]
        .iter()
        .map(|n| Episode {
            number: Some(n.to_string()),
            ..Episode::new(&project.id, format!("Episode {}", n))
        })
        .collect();
    let first_id = episodes[0].id.clone();
    stores
        .episodes
        .insert_episodes(&project.id, episodes)
        .await
        .unwrap();

    let response = server
        .client
        .post(&batch_url)
        .json(&serde_json::json!({ "episodeIds": [first_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["success"], true);
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["cancelled"], false);

    let progress: Value = server
        .client
        .get(&progress_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress["state"], "completed");
    assert_eq!(progress["completed"], 1);

    let cancel: Value = server
        .client
        .post(format!("{}/projects/{}/artwork/cancel", server.base_url, project.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancel["cancelled"], false);
}

#[tokio::test]
async fn test_export_and_sync_endpoints() {
    let server = spawn_server().await;
    let stores = server.service.stores().clone();
    let project = stores.projects.create_project("Show").await.unwrap();
    let project_url = format!("{}/projects/{}", server.base_url, project.id);

    let response = server.client.get(format!("{}/feed", project_url)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let response = server.client.post(format!("{}/sync", project_url)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let response = server.client.get(format!("{}/archive", project_url)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let auto_sync_url = format!("{}/auto-sync", project_url);
    let response = server
        .client
        .put(&auto_sync_url)
        .json(&serde_json::json!({ "enabled": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let response = server.client.put(&auto_sync_url).body("yes").send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = server
        .client
        .put(&auto_sync_url)
        .json(&serde_json::json!({ "enabled": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["autoSync"], false);

    server
        .service
        .set_base_artwork(&project.id, "base.png")
        .await
        .unwrap();
    let episode = Episode {
        number: Some("8".to_string()),
        ..Episode::new(&project.id, "Eight")
    };
    stores
        .episodes
        .insert_episodes(&project.id, vec![episode.clone()])
        .await
        .unwrap();
    server.service.generate_single(&episode.id).await.unwrap();

    let list = server
        .client
        .get(format!("{}/artwork/urls", project_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(list.contains("Episode 8: Eight\nhttps://cdn.test/8.png\n"));

    // The image host is unreachable, so the archive comes back empty.
    let response = server.client.get(format!("{}/archive", project_url)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string()
    };
    assert_eq!(header(reqwest::header::CONTENT_TYPE), "application/zip");
    assert_eq!(
        header(reqwest::header::CONTENT_DISPOSITION),
        "attachment; filename=\"show-artwork.zip\""
    );
}
