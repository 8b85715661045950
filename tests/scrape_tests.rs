use batch_scraper::{Orchestrator, PageResult, RunConfig, ScrapingConfig};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"
<html><body>
  <h1 class="title">Sneakers</h1>
  <ul class="results">
    <li class="result"><a href="/p/1">One</a><span class="price">$10</span></li>
    <li class="result"><a href="/p/2">Two</a></li>
  </ul>
</body></html>
"#;

fn scraping_config() -> ScrapingConfig {
    ScrapingConfig::from_value(&json!({
        "127.0.0.1": {"config": {
            "title": {"element-config": [{"tag": "h1", "class": "title"}], "attr": ".text"},
            "results": {
                "element-config": [{"tag": "ul", "class": "results"}, {"tag": "li", "class": "result", "max": 0}],
                "link": {"element-config": [{"tag": "a", "href": true}], "attr": "href"},
                "price": {"element-config": [{"tag": "span", "class": "price"}], "attr": ".text"}
            },
            "missing": {"element-config": [{"tag": "table", "id": "none"}], "attr": ".text"}
        }}
    }))
    .unwrap()
}

fn run_config(dir: &tempfile::TempDir) -> RunConfig {
    RunConfig::default()
        .with_batch_size(2)
        .with_batch_delay(Duration::ZERO)
        .with_request_timeout(Duration::from_secs(5))
        .with_cookie_path(dir.path().join("cookies.json"))
        .with_extraction_workers(2)
}

async fn mount_pages(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_run() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::new(run_config(&dir), scraping_config()).unwrap();
    let search = format!("{}/search", mock_server.uri());
    let gone = format!("{}/gone", mock_server.uri());

    let results = orchestrator.run(&[search.clone(), gone.clone()]).await;
    assert_eq!(results.len(), 2);

    assert_eq!(serde_json::to_value(&results[&gone]).unwrap(), json!({"status": 404}));

    let value = serde_json::to_value(&results[&search]).unwrap();
    assert_eq!(
        value,
        json!({
            "title": "Sneakers",
            "results": [
                {"link": format!("{}/p/1", mock_server.uri()), "price": "$10"},
                {"link": format!("{}/p/2", mock_server.uri()), "price": null}
            ],
            "missing": null
        })
    );
}

#[tokio::test]
async fn test_many_batches_cover_every_url() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::new(run_config(&dir), scraping_config()).unwrap();
    let urls: Vec<String> = (0..5)
        .map(|i| format!("{}/search?page={}", mock_server.uri(), i))
        .collect();

    let results = orchestrator.run_until_cancelled(&urls, CancellationToken::new()).await;
    assert_eq!(results.len(), 5);
    for url in &urls {
        assert!(matches!(results[url], PageResult::Items(_)), "{url}");
    }
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_results() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::new(run_config(&dir), scraping_config()).unwrap();
    let urls = vec![format!("{}/search", mock_server.uri())];

    let token = CancellationToken::new();
    token.cancel();
    let results = orchestrator.run_until_cancelled(&urls, token).await;
    assert!(results.is_empty());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_interrupts_batch_delay() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = run_config(&dir).with_batch_size(1).with_batch_delay(Duration::from_secs(30));
    let mut orchestrator = Orchestrator::new(config, scraping_config()).unwrap();
    let urls = vec![
        format!("{}/search", mock_server.uri()),
        format!("{}/gone", mock_server.uri()),
    ];

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        })
    };

    let started = Instant::now();
    let results = orchestrator.run_until_cancelled(&urls, token).await;
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_delay_only_between_batches() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let delay = Duration::from_millis(1500);
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(&dir).with_batch_size(1).with_batch_delay(delay);
    let mut orchestrator = Orchestrator::new(config, scraping_config()).unwrap();
    let urls = vec![
        format!("{}/search", mock_server.uri()),
        format!("{}/gone", mock_server.uri()),
    ];

    let started = Instant::now();
    let results = orchestrator.run_until_cancelled(&urls, CancellationToken::new()).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 2);
    assert!(elapsed >= delay, "{elapsed:?}");
    assert!(elapsed < delay * 2, "delay after the last batch: {elapsed:?}");
}

#[tokio::test]
async fn test_single_batch_run_has_no_delay() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server).await;

    let delay = Duration::from_secs(3);
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(&dir).with_batch_delay(delay);
    let mut orchestrator = Orchestrator::new(config, scraping_config()).unwrap();
    let urls = vec![
        format!("{}/search", mock_server.uri()),
        format!("{}/gone", mock_server.uri()),
    ];

    let started = Instant::now();
    let results = orchestrator.run_until_cancelled(&urls, CancellationToken::new()).await;

    assert_eq!(results.len(), 2);
    assert!(started.elapsed() < delay, "{:?}", started.elapsed());
}
