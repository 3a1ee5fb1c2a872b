//! Core data model shared by the crawler, extractor and reconciler
//!
//! - `PageRecord`: one successfully fetched page
//! - `ProgramRecord`: one admission program, extracted or stored
//! - `CorrectionRecord`: a human-verified override for a program
//! - `Divergence`: a mismatch between extracted and corrected values

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A page fetched during a crawl
///
/// Created by a `Fetcher` for every successful fetch and never modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical absolute URL of the page
    pub url: String,

    /// Contents of the `<title>` tag (empty when missing)
    pub title: String,

    /// Plain text content with whitespace collapsed
    pub text: String,

    /// Cleaned HTML (scripts and styles removed)
    pub markup: String,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,

    /// Wall-clock time spent loading the page, in milliseconds
    pub load_duration_ms: u64,
}

impl PageRecord {
    /// Length of the plain text content in characters
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Degree level of an admission program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramCategory {
    Undergraduate,
    Masters,
    Phd,
    Certification,
    Diploma,
}

impl ProgramCategory {
    /// Converts the category to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Undergraduate => "undergraduate",
            Self::Masters => "masters",
            Self::Phd => "phd",
            Self::Certification => "certification",
            Self::Diploma => "diploma",
        }
    }

    /// Parses a category string, accepting the common spellings a model or
    /// a human reviewer might produce
    ///
    /// Returns None if the string doesn't match any known category.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "undergraduate" | "bachelor" | "bachelors" | "ug" => Some(Self::Undergraduate),
            "masters" | "master" | "master's" | "graduate" | "postgraduate" => {
                Some(Self::Masters)
            }
            "phd" | "ph.d" | "ph.d." | "doctorate" | "doctoral" => Some(Self::Phd),
            "certification" | "certificate" | "certificates" => Some(Self::Certification),
            "diploma" => Some(Self::Diploma),
            _ => None,
        }
    }

    /// Infers a category from degree-level markers in a program name
    ///
    /// # Examples
    ///
    /// ```
    /// use campus_harvest::ProgramCategory;
    ///
    /// assert_eq!(
    ///     ProgramCategory::infer_from_name("BS Computer Science"),
    ///     Some(ProgramCategory::Undergraduate)
    /// );
    /// assert_eq!(
    ///     ProgramCategory::infer_from_name("Master of Business Administration"),
    ///     Some(ProgramCategory::Masters)
    /// );
    /// assert_eq!(ProgramCategory::infer_from_name("Sports Day 2024"), None);
    /// ```
    pub fn infer_from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase().replace('.', "");
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let phrase = format!(" {} ", words.join(" "));

        let has_word = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));
        let has_phrase = |candidates: &[&str]| {
            candidates
                .iter()
                .any(|p| phrase.contains(&format!(" {} ", p)))
        };

        if has_word(&["phd", "doctorate"]) || has_phrase(&["doctor of philosophy"]) {
            return Some(Self::Phd);
        }
        if has_word(&["ms", "msc", "mba", "mphil", "ma", "master", "masters", "mcs", "mscs"]) {
            return Some(Self::Masters);
        }
        if has_word(&[
            "bs", "bsc", "ba", "bba", "bachelor", "bachelors", "mbbs", "bds", "bsn", "pharmd",
            "bed", "bcom", "dpt",
        ]) || has_phrase(&["pharm d", "doctor of pharmacy", "doctor of physical therapy"])
        {
            return Some(Self::Undergraduate);
        }
        if has_word(&["diploma"]) {
            return Some(Self::Diploma);
        }
        if has_word(&["certificate", "certification"]) || has_phrase(&["short course"]) {
            return Some(Self::Certification);
        }
        None
    }
}

impl fmt::Display for ProgramCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Identity of a program: university plus the normalised program name
pub type ProgramKey = (String, String);

/// Normalises a program name for identity comparison
///
/// Trims, collapses inner whitespace and lowercases.
pub fn normalize_program_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// An admission program offered by a university
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub program_name: String,
    pub category: ProgramCategory,
    pub admission_open: bool,
    pub application_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub deadlines: Vec<NaiveDate>,
    pub link: String,
    pub source_text: String,
    pub source_url: String,
    pub university: String,
}

impl ProgramRecord {
    /// Returns the identity key `(university, normalised program name)`
    pub fn key(&self) -> ProgramKey {
        (
            self.university.clone(),
            normalize_program_name(&self.program_name),
        )
    }

    /// Returns the deadlines this record asserts
    ///
    /// `deadlines` wins when non-empty; otherwise the single
    /// `application_deadline`, if any.
    pub fn effective_deadlines(&self) -> Vec<NaiveDate> {
        if !self.deadlines.is_empty() {
            self.deadlines.clone()
        } else {
            self.application_deadline.into_iter().collect()
        }
    }

    /// Overwrites the correctable fields with a human correction
    pub fn apply_correction(&mut self, correction: &CorrectionRecord) {
        self.category = correction.category;
        self.admission_open = correction.admission_open;
        self.deadlines = correction.deadlines.clone();
        self.application_deadline = correction.deadlines.first().copied();
    }
}

/// A human-verified override of the correctable program fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub category: ProgramCategory,
    pub admission_open: bool,
    #[serde(default)]
    pub deadlines: Vec<NaiveDate>,
}

/// A field that can diverge between extraction and correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergentField {
    Category,
    AdmissionOpen,
    Deadlines,
}

impl DivergentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::AdmissionOpen => "admission_open",
            Self::Deadlines => "deadlines",
        }
    }
}

/// One mismatching field with both values rendered for review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDivergence {
    pub field: DivergentField,
    pub extracted: String,
    pub corrected: String,
}

/// Mismatch between what the extractor produced and what a human corrected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub university: String,
    pub program_name: String,
    pub fields: Vec<FieldDivergence>,
}

impl Divergence {
    /// Returns true if the given field is among the mismatches
    pub fn mentions(&self, field: DivergentField) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

/// Counters reported when a university agent completes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub university: String,
    pub pages_fetched: usize,
    pub pages_rejected: usize,
    pub pages_skipped_visited: usize,
    pub fetch_failures: usize,
    pub programs_extracted: usize,
    pub divergences: usize,
    pub records_upserted: usize,
    pub records_failed: usize,
}

impl RunSummary {
    pub fn new(university: impl Into<String>) -> Self {
        Self {
            university: university.into(),
            ..Default::default()
        }
    }
}

/// Renders a deadline list as `[2025-01-31, 2025-06-30]`
pub fn format_deadlines(deadlines: &[NaiveDate]) -> String {
    let parts: Vec<String> = deadlines
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    format!("[{}]", parts.join(", "))
}
