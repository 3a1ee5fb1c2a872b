//! Extraction of admission programs from page text
//!
//! The `Extractor` trait is the seam between the crawl pipeline and the
//! language model. `LlmExtractor` talks to any OpenAI-compatible
//! chat-completions endpoint (Groq by default).

mod llm;
mod parse;
mod prompt;

pub use llm::LlmExtractor;
pub use parse::{parse_model_output, strip_code_fences};
pub use prompt::{build_user_prompt, truncate_chars, SYSTEM_PROMPT};

use crate::model::ProgramRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Extraction failures that survive the retry policy
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction request failed: {0}")]
    Transport(String),

    #[error("Extraction endpoint rate limited the request (HTTP 429)")]
    RateLimited,

    #[error("Extraction endpoint error: HTTP {0}")]
    Server(u16),

    #[error("Failed to build extraction client: {0}")]
    Client(String),
}

/// Turns the text of one page into program records
///
/// Returned records carry an empty `university`; the caller owns that field.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts programs from page text
    ///
    /// # Returns
    ///
    /// * `Ok(vec![])` for empty input or unusable model output
    /// * `Err(ExtractionError)` only when the endpoint stays unreachable
    async fn extract(&self, text: &str, url: &str) -> Result<Vec<ProgramRecord>, ExtractionError>;
}
