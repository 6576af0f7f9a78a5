//! Title and resolution lookup against a local HTTP server

mod common;

use common::FakeExtractor;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tubecore::download::options::FALLBACK_HEIGHTS;
use tubecore::download::MetadataResolver;

fn resolver(server: &MockServer, extractor: FakeExtractor) -> MetadataResolver {
    MetadataResolver::new(Arc::new(extractor))
        .unwrap()
        .with_oembed_endpoint(format!("{}/oembed", server.uri()))
}

fn watch_url(server: &MockServer) -> String {
    format!("{}/watch?v=abc123", server.uri())
}

#[tokio::test]
async fn test_oembed_title_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "  Exact oEmbed Title ",
            "author_name": "someone"
        })))
        .mount(&server)
        .await;

    let extractor = FakeExtractor::new("Probe Title", "mp4").with_heights(&[720, 1080]);
    let details = resolver(&server, extractor).resolve(&watch_url(&server)).await;

    assert_eq!(details.title, "Exact oEmbed Title");
    assert_eq!(details.heights, vec![1080, 720]);
}

#[tokio::test]
async fn test_probe_title_when_network_sources_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let extractor = FakeExtractor::new("Sample Video", "mp4").with_heights(&[480, 1080, 720]);
    let details = resolver(&server, extractor).resolve(&watch_url(&server)).await;

    assert_eq!(details.title, "Sample Video");
    assert_eq!(details.heights, vec![1080, 720, 480]);
    assert_eq!(
        details.video_labels(),
        vec!["Best available (MP4)", "1080p (Full HD)", "720p (HD)", "480p"]
    );
}

#[tokio::test]
async fn test_watch_page_og_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(header("cookie", "CONSENT=YES+1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta property="og:title" content="Page Title"><title>Page Title - YouTube</title></head></html>"#,
        ))
        .mount(&server)
        .await;

    let extractor = FakeExtractor::new("Probe Title", "mp4");
    let details = resolver(&server, extractor).resolve(&watch_url(&server)).await;

    assert_eq!(details.title, "Page Title");
}

#[tokio::test]
async fn test_everything_failing_degrades_to_fallback_ladder() {
    let server = MockServer::start().await;
    // no mocks mounted: every request gets a 404

    let details = resolver(&server, FakeExtractor::unreachable())
        .resolve(&watch_url(&server))
        .await;

    assert_eq!(details.title, "");
    assert_eq!(details.thumbnail, None);
    assert_eq!(details.heights, FALLBACK_HEIGHTS.to_vec());
    assert_eq!(details.image_labels()[0], "Best available");
    assert_eq!(details.image_labels()[1], "4320p (8K)");
}
