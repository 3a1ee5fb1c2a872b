//! Crawl frontier tests against a mock university website

use campus_harvest::config::FetchConfig;
use campus_harvest::crawler::{
    effective_keywords, AdaptiveThrottle, CrawlOutcome, FrontierEngine, HttpFetcher, RetryPolicy,
    SiteProfile,
};
use campus_harvest::storage::{SharedStorage, SqliteStorage, VisitedStore};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNIVERSITY: &str = "Mock University";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Mock</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

fn create_test_fetcher() -> HttpFetcher {
    let config = FetchConfig {
        user_agent: "campus-harvest-test/0.1".to_string(),
        timeout_secs: 5,
    };
    let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
    HttpFetcher::new(&config, retry).unwrap()
}

fn open_shared(db_path: &Path) -> SharedStorage {
    SharedStorage::new(SqliteStorage::new(db_path).unwrap())
}

async fn crawl(
    storage: &SharedStorage,
    seeds: &[String],
    budget: usize,
    force_refresh: bool,
) -> CrawlOutcome {
    let fetcher = create_test_fetcher();
    let site = SiteProfile {
        university: UNIVERSITY.to_string(),
        domain: "127.0.0.1".to_string(),
        keywords: effective_keywords(&[]),
        min_content_length: 20,
    };
    let throttle = AdaptiveThrottle::new(Duration::ZERO, Duration::ZERO, 1.0);
    let mut visited = storage.get_visited(UNIVERSITY).unwrap();

    let mut engine = FrontierEngine::new(&fetcher, storage, throttle, site);
    engine.crawl(seeds, &mut visited, budget, force_refresh).await
}

#[tokio::test]
async fn test_crawl_follows_keyword_links_one_level() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(
            r#"<p>Admissions are open for all undergraduate programs this fall.</p>
            <a href="/programs/bs-cs">BS Computer Science</a>
            <a href="/faculty/engineering">Engineering</a>
            <a href="/about">About us</a>
            <a href="https://other-university.edu/programs">Elsewhere</a>
            <a href="mailto:admissions@uni.edu.pk">Email</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/programs/bs-cs"))
        .respond_with(html(
            r#"<p>BS Computer Science: apply by 31 December 2025.</p>
            <a href="/programs/ms-cs">MS Computer Science</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/faculty/engineering"))
        .respond_with(html("<p>The Faculty of Engineering offers several degrees.</p>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("<p>About this university and its long history.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/programs/ms-cs"))
        .respond_with(html("<p>MS Computer Science details and deadlines.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = open_shared(&temp.path().join("harvest.db"));
    let seeds = vec![format!("{}/admissions", base)];

    let outcome = crawl(&storage, &seeds, 10, false).await;

    assert_eq!(outcome.pages.len(), 3);
    assert!(outcome.pages[0].url.ends_with("/admissions"));
    assert!(outcome.pages[1].url.ends_with("/programs/bs-cs"));
    assert!(outcome.pages[2].url.ends_with("/faculty/engineering"));
    assert_eq!(outcome.stats.fetch_attempts, 3);
    assert_eq!(storage.get_visited(UNIVERSITY).unwrap().len(), 3);
}

#[tokio::test]
async fn test_link_budget_bounds_fetches() {
    let server = MockServer::start().await;

    let links: String = (0..8)
        .map(|i| format!(r#"<a href="/programs/p{}">Program {}</a>"#, i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(&format!(
            "<p>All programs offered by the university are listed below.</p>{}",
            links
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("<p>Program page with enough descriptive text.</p>"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = open_shared(&temp.path().join("harvest.db"));
    let seeds = vec![format!("{}/admissions", server.uri())];

    let outcome = crawl(&storage, &seeds, 3, false).await;

    assert_eq!(outcome.stats.fetch_attempts, 4);
    assert_eq!(outcome.pages.len(), 4);
    assert!(outcome.pages[1].url.ends_with("/programs/p0"));
    assert!(outcome.pages[3].url.ends_with("/programs/p2"));
}

#[tokio::test]
async fn test_visited_urls_survive_restart() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(
            "<p>Admissions for the next academic session open in June.</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("harvest.db");
    let seeds = vec![format!("{}/admissions", server.uri())];

    {
        let storage = open_shared(&db_path);
        let outcome = crawl(&storage, &seeds, 5, false).await;
        assert_eq!(outcome.pages.len(), 1);
    }

    let storage = open_shared(&db_path);
    let outcome = crawl(&storage, &seeds, 5, false).await;

    assert!(outcome.pages.is_empty());
    assert_eq!(outcome.stats.pages_skipped_visited, 1);
    assert_eq!(outcome.stats.fetch_attempts, 0);
}

#[tokio::test]
async fn test_force_refresh_refetches_visited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(
            "<p>Admissions for the next academic session open in June.</p>",
        ))
        .expect(2)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = open_shared(&temp.path().join("harvest.db"));
    let seeds = vec![format!("{}/admissions", server.uri())];

    crawl(&storage, &seeds, 5, false).await;
    let outcome = crawl(&storage, &seeds, 5, true).await;

    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(storage.get_visited(UNIVERSITY).unwrap().len(), 1);
}

#[tokio::test]
async fn test_thin_seed_page_is_visited_but_not_returned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(
            r#"<p>Soon.</p><a href="/programs/bs">BS</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/programs/bs"))
        .respond_with(html("<p>BS program page with plenty of text.</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = open_shared(&temp.path().join("harvest.db"));
    let seed = format!("{}/admissions", server.uri());

    let outcome = crawl(&storage, &[seed], 5, false).await;

    assert!(outcome.pages.is_empty());
    assert_eq!(outcome.stats.pages_rejected, 1);
    let visited = storage.get_visited(UNIVERSITY).unwrap();
    assert_eq!(visited.len(), 1);
    assert!(visited.iter().all(|u| u.ends_with("/admissions")));
}

#[tokio::test]
async fn test_failed_seed_does_not_abort_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(html(
            "<p>Admissions for the next academic session open in June.</p>",
        ))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = open_shared(&temp.path().join("harvest.db"));
    let seeds = vec![
        format!("{}/broken", server.uri()),
        format!("{}/admissions", server.uri()),
    ];

    let outcome = crawl(&storage, &seeds, 5, false).await;

    assert_eq!(outcome.stats.fetch_failures, 1);
    assert_eq!(outcome.pages.len(), 1);

    // failed URLs stay eligible for the next run
    let visited = storage.get_visited(UNIVERSITY).unwrap();
    assert!(!visited.iter().any(|u| u.ends_with("/broken")));
}
