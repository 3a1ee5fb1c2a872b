use serde::Deserialize;

/// Main configuration structure for Campus-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub fetch: FetchConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "university")]
    pub universities: Vec<UniversityEntry>,
}

/// Crawl frontier behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of discovered links explored per seed page
    #[serde(rename = "link-budget-per-seed")]
    pub link_budget_per_seed: usize,

    /// Pages whose plain text is shorter than this (in characters) are rejected
    #[serde(rename = "min-content-length", default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Lower bound of the politeness delay between fetches (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the politeness delay between fetches (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the previous page's load time
    #[serde(rename = "delay-factor", default = "default_delay_factor")]
    pub delay_factor: f64,
}

/// Retry policy for page fetches
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per URL, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds); doubles on each retry
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Ceiling for the retry delay (milliseconds)
    #[serde(rename = "backoff-cap-ms")]
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_cap_ms: 10_000,
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User agent sent with every page request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// LLM extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Page text beyond this many characters is not sent to the model
    #[serde(rename = "max-input-chars", default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(rename = "max-attempts", default = "default_extraction_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "backoff-base-ms", default = "default_extraction_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(rename = "backoff-cap-ms", default = "default_extraction_backoff_cap")]
    pub backoff_cap_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one artifact folder per agent
    #[serde(rename = "artifacts-dir")]
    pub artifacts_dir: String,
}

/// One university and the site profile its agent crawls
#[derive(Debug, Clone, Deserialize)]
pub struct UniversityEntry {
    /// University name as stored on program records
    pub name: String,

    /// Agent identifier, also the artifact directory name
    pub agent: String,

    /// The university's registrable domain (e.g., "nust.edu.pk")
    pub domain: String,

    /// Seed URLs, always attempted first and in order
    pub seeds: Vec<String>,

    /// Topical keywords a discovered link must contain; defaults apply when empty
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_min_content_length() -> usize {
    200
}

fn default_delay_factor() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_input_chars() -> usize {
    6000
}

fn default_extraction_attempts() -> u32 {
    3
}

fn default_extraction_backoff_base() -> u64 {
    4000
}

fn default_extraction_backoff_cap() -> u64 {
    10_000
}
