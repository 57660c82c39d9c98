//! Integration tests for the cache invalidation service
//!
//! These tests verify:
//! - URL normalization before purging
//! - Dispatch by purge type to the right wire key
//! - File-extension purges over public assets
//! - Immediate entity purges and metrics

use edge_purge::{
    CacheInvalidationService, EntityRef, InMemoryEntityStore, InMemoryJobQueue, PurgeConfig,
    PurgeMetrics, PurgeType, Purgeable,
};
use http::HeaderMap;
use prometheus::Registry;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PURGE_PATH: &str = "/zones/zone-1/purge_cache";

fn success_body() -> Value {
    json!({
        "errors": [],
        "messages": [],
        "result": { "id": "023e105f4ecef8ad9ca31a8372d0c353" },
        "success": true
    })
}

fn create_service(
    server: &MockServer,
    configure: impl FnOnce(&mut PurgeConfig),
) -> (CacheInvalidationService, Arc<InMemoryEntityStore>) {
    let mut config = PurgeConfig::for_zone("zone-1", "test-token");
    config.api_base = server.uri();
    configure(&mut config);

    let store = Arc::new(InMemoryEntityStore::new());
    let service = CacheInvalidationService::new(
        Arc::new(config),
        Arc::new(InMemoryJobQueue::new()),
        store.clone(),
    )
    .unwrap();
    (service, store)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

struct Page {
    link: Option<String>,
}

impl Purgeable for Page {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new("Page", 1)
    }

    fn canonical_link(&self) -> Option<String> {
        self.link.clone()
    }
}

#[tokio::test]
async fn test_purge_urls_uses_base_url() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(body_json(json!({
            "files": [
                "https://another.example.com/test-page-one/",
                "https://another.example.com/record.html?alternateformat=1"
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, _) = create_service(&mock_server, |config| {
        config.base_url = Some("https://another.example.com/".to_string());
    });

    let response = service
        .purge_urls(&strings(&[
            "/test-page-one/",
            "https://example.com/record.html?stage=Stage&alternateformat=1",
        ]))
        .await
        .unwrap();
    assert!(response.all_success());
}

#[tokio::test]
async fn test_relative_urls_without_base_are_not_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(body_json(json!({ "files": ["https://www.example.com/a"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, _) = create_service(&mock_server, |_| {});

    assert!(service.purge_urls(&strings(&["/b", "c/"])).await.is_none());

    let response = service
        .purge_urls(&strings(&["https://www.example.com/a", "/b"]))
        .await
        .unwrap();
    assert!(response.all_success());
}

#[tokio::test]
async fn test_purge_for_type_wire_keys() {
    let mock_server = MockServer::start().await;
    for body in [
        json!({ "hosts": ["www.example.com"] }),
        json!({ "tags": ["news"] }),
        json!({ "prefixes": ["www.example.com/blog"] }),
    ] {
        Mock::given(method("POST"))
            .and(path(PURGE_PATH))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let (service, _) = create_service(&mock_server, |_| {});

    let hosts = service.purge_hosts(&strings(&["www.example.com"])).await.unwrap();
    assert!(hosts.all_success());

    let prefixes = service
        .purge_prefixes(&strings(&["www.example.com/blog"]))
        .await
        .unwrap();
    assert!(prefixes.all_success());

    let tags = service
        .purge_for_type(PurgeType::Tag, &strings(&["news"]), &HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(tags.results()[0].sent_values("tags"), vec!["news"]);
}

#[tokio::test]
async fn test_purge_css_javascript_from_assets() {
    let assets = TempDir::new().unwrap();
    fs::create_dir_all(assets.path().join("client/dist")).unwrap();
    fs::write(assets.path().join("client/dist/app.js"), b"js").unwrap();
    fs::write(assets.path().join("client/dist/app.css"), b"css").unwrap();
    fs::write(assets.path().join("client/dist/logo.svg"), b"svg").unwrap();

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(body_json(json!({
            "files": [
                "https://www.example.com/_resources/client/dist/app.css",
                "https://www.example.com/_resources/client/dist/app.js"
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assets_dir = assets.path().to_string_lossy().into_owned();
    let (service, _) = create_service(&mock_server, |config| {
        config.assets_dir = Some(assets_dir);
        config.site_url = Some("https://www.example.com".to_string());
    });

    let response = service.purge_css_javascript().await.unwrap();
    assert!(response.all_success());
}

#[tokio::test]
async fn test_purge_by_file_extension_includes_published_files() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(body_json(json!({
            "files": ["https://www.example.com/assets/report.pdf"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, store) = create_service(&mock_server, |config| {
        config.site_url = Some("https://www.example.com".to_string());
    });
    store.add_published_file("/assets/report.pdf");
    store.add_published_file("/assets/photo.png");

    let response = service
        .purge_by_file_extension(&strings(&["PDF"]))
        .await
        .unwrap();
    assert_eq!(response.result_count(), 1);
}

#[tokio::test]
async fn test_no_matching_files_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (service, _) = create_service(&mock_server, |_| {});
    assert!(service.purge_images().await.is_none());
}

#[tokio::test]
async fn test_purge_entity_with_reason() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(header("x-purge-reason", "before-delete"))
        .and(body_json(json!({ "files": ["https://www.example.com/page/"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (service, _) = create_service(&mock_server, |_| {});
    let page = Page {
        link: Some("https://www.example.com/page/".to_string()),
    };

    let response = service
        .purge_entity_with_reason(&page, "before-delete")
        .await
        .unwrap();
    assert!(response.all_success());

    let headers = response.summary_headers();
    assert_eq!(
        headers,
        vec![(
            "X-Cache-Purge-Success",
            "023e105f4ecef8ad9ca31a8372d0c353".to_string()
        )]
    );
}

#[tokio::test]
async fn test_purge_entity_without_links() {
    let mock_server = MockServer::start().await;
    let (service, _) = create_service(&mock_server, |_| {});

    assert!(service.purge_entity(&Page { link: None }).await.is_none());
}

#[tokio::test]
async fn test_metrics_recorded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&mock_server)
        .await;

    let registry = Registry::new();
    let metrics = Arc::new(PurgeMetrics::with_registry(&registry).unwrap());
    let (service, _) = create_service(&mock_server, |_| {});
    let service = service.with_metrics(metrics.clone());

    let tags: Vec<String> = (0..45).map(|i| format!("tag-{}", i)).collect();
    service.purge_tags(&tags).await.unwrap();

    assert_eq!(
        metrics.purge_requests_total.with_label_values(&["Tag"]).get(),
        1.0
    );
    assert_eq!(metrics.purge_items_total.with_label_values(&["Tag"]).get(), 45.0);
    assert_eq!(
        metrics
            .purge_results_total
            .with_label_values(&["Tag", "success"])
            .get(),
        2.0
    );
}
