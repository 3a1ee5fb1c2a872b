//! End-to-end harvest tests: mock site, mock extraction endpoint, real SQLite

use campus_harvest::agent::{run_all, RunOptions};
use campus_harvest::config::{load_config_with_hash, Config};
use campus_harvest::extraction::{Extractor, LlmExtractor};
use campus_harvest::model::{CorrectionRecord, Divergence, DivergentField, ProgramCategory};
use campus_harvest::storage::{CorrectionStore, SharedStorage, SqliteStorage, Storage};
use campus_harvest::{ConfigError, HarvestError};
use chrono::NaiveDate;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNIVERSITY: &str = "Mock University";

/// Writes a config pointing at the mock site and endpoint, then loads it
fn create_test_config(dir: &Path, site: &MockServer, llm: &MockServer) -> (Config, String) {
    let config_path = dir.join("harvest.toml");
    let toml = format!(
        r#"
[crawler]
link-budget-per-seed = 5
min-content-length = 20
min-delay-ms = 0
max-delay-ms = 0

[retry]
max-attempts = 2
backoff-base-ms = 1
backoff-cap-ms = 5

[fetch]
user-agent = "campus-harvest-test/0.1"
timeout-secs = 5

[extraction]
endpoint = "{llm}"
model = "llama3-8b-8192"
api-key-env = "CAMPUS_HARVEST_TEST_KEY"
backoff-base-ms = 1
backoff-cap-ms = 5

[output]
database-path = "{db}"
artifacts-dir = "{artifacts}"

[[university]]
name = "{UNIVERSITY}"
agent = "mock"
domain = "127.0.0.1"
seeds = ["{site}/admissions"]
"#,
        llm = llm.uri(),
        site = site.uri(),
        db = dir.join("harvest.db").display(),
        artifacts = dir.join("artifacts").display(),
    );
    std::fs::write(&config_path, toml).unwrap();
    load_config_with_hash(&config_path).unwrap()
}

async fn mount_site(site: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/admissions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Admissions</title></head><body>
            <p>Admissions are open for BS Computer Science. Apply before 30 November 2025.</p>
            </body></html>"#,
            "text/html",
        ))
        .mount(site)
        .await;
}

async fn mount_llm(llm: &MockServer, expected_calls: u64) {
    let content = json!([{
        "program_name": "BS Computer Science",
        "category": "undergraduate",
        "admission_open": false,
        "application_deadline": "2025-11-30",
        "link": null,
        "source_text": "Apply before 30 November 2025"
    }])
    .to_string();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })))
        .expect(expected_calls)
        .mount(llm)
        .await;
}

fn shared_storage(config: &Config) -> SharedStorage {
    SharedStorage::new(SqliteStorage::new(Path::new(&config.output.database_path)).unwrap())
}

fn extractor(config: &Config) -> Arc<dyn Extractor> {
    Arc::new(LlmExtractor::new(&config.extraction, "test-key").unwrap())
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_harvest_reconciles_against_corrections() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;
    mount_site(&site).await;
    mount_llm(&llm, 1).await;

    let temp = TempDir::new().unwrap();
    let (config, hash) = create_test_config(temp.path(), &site, &llm);
    let storage = shared_storage(&config);
    storage
        .put_correction(
            UNIVERSITY,
            "BS Computer Science",
            &CorrectionRecord {
                category: ProgramCategory::Undergraduate,
                admission_open: true,
                deadlines: vec![date("2025-12-31")],
            },
        )
        .unwrap();

    let report = run_all(
        &config,
        &hash,
        storage.clone(),
        extractor(&config),
        &RunOptions::default(),
    )
    .await
    .unwrap();

    assert!(report.is_success());
    let summary = &report.summaries[0];
    assert_eq!(summary.university, UNIVERSITY);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.programs_extracted, 1);
    assert_eq!(summary.divergences, 1);
    assert_eq!(summary.records_upserted, 1);

    let programs = storage.lock().unwrap().get_programs(UNIVERSITY).unwrap();
    assert_eq!(programs.len(), 1);
    assert!(programs[0].admission_open);
    assert_eq!(programs[0].deadlines, vec![date("2025-12-31")]);
    assert_eq!(programs[0].application_deadline, Some(date("2025-12-31")));
    assert!(programs[0].link.ends_with("/admissions"));

    let artifacts = temp.path().join("artifacts").join("mock");
    let divergences: Vec<Divergence> = serde_json::from_str(
        &std::fs::read_to_string(artifacts.join("divergences.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(divergences.len(), 1);
    assert!(divergences[0].mentions(DivergentField::AdmissionOpen));
    assert!(divergences[0].mentions(DivergentField::Deadlines));
    assert!(!divergences[0].mentions(DivergentField::Category));
    assert!(artifacts.join("pages.json").is_file());
    assert!(artifacts.join("programs.json").is_file());

    let run = storage
        .lock()
        .unwrap()
        .get_latest_run(UNIVERSITY)
        .unwrap()
        .unwrap();
    assert_eq!(run.config_hash, hash);
    assert_eq!(&run.summary, summary);
}

#[tokio::test]
async fn test_second_harvest_is_incremental() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;
    mount_site(&site).await;
    mount_llm(&llm, 1).await;

    let temp = TempDir::new().unwrap();
    let (config, hash) = create_test_config(temp.path(), &site, &llm);
    let storage = shared_storage(&config);

    let first = run_all(
        &config,
        &hash,
        storage.clone(),
        extractor(&config),
        &RunOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(first.summaries[0].records_upserted, 1);

    let second = run_all(
        &config,
        &hash,
        storage.clone(),
        extractor(&config),
        &RunOptions::default(),
    )
    .await
    .unwrap();

    let summary = &second.summaries[0];
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.pages_skipped_visited, 1);
    assert_eq!(summary.programs_extracted, 0);
    assert_eq!(storage.lock().unwrap().count_programs(UNIVERSITY).unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_university_filter_is_rejected() {
    let site = MockServer::start().await;
    let llm = MockServer::start().await;

    let temp = TempDir::new().unwrap();
    let (config, hash) = create_test_config(temp.path(), &site, &llm);
    let options = RunOptions {
        force_refresh: false,
        university: Some("Nowhere University".to_string()),
    };

    let result = run_all(
        &config,
        &hash,
        shared_storage(&config),
        extractor(&config),
        &options,
    )
    .await;

    assert!(matches!(
        result,
        Err(HarvestError::Config(ConfigError::Validation(_)))
    ));
}
