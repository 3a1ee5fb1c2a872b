//! Lenient parsing of model output into program records

use crate::model::{ProgramCategory, ProgramRecord};
use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Removes a surrounding Markdown code fence, with or without a language tag
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the language tag line, if any
    let body = match rest.find('\n') {
        Some(idx) if !rest[..idx].contains('[') => &rest[idx + 1..],
        _ => rest,
    };

    body.trim_end().trim_end_matches("```").trim()
}

/// Parses the model's reply into program records
///
/// The reply is expected to hold a JSON array somewhere inside it; the
/// outermost `[ ... ]` span is parsed. Anything else yields an empty list.
/// Per element:
/// - a missing or blank `program_name` drops the element
/// - an unknown `category` is inferred from the program name, else dropped
/// - unparsable dates become null
/// - a missing `link` defaults to `source_url`
/// - `source_url` is always the page URL
pub fn parse_model_output(raw: &str, source_url: &str) -> Vec<ProgramRecord> {
    let cleaned = strip_code_fences(raw);

    let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) else {
        tracing::warn!("No JSON array in model output for {}", source_url);
        return Vec::new();
    };
    if end < start {
        tracing::warn!("No JSON array in model output for {}", source_url);
        return Vec::new();
    }

    let items = match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("Model output for {} is not a list", source_url);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Unparsable model output for {}: {}", source_url, e);
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => parse_program(fields, source_url),
            _ => None,
        })
        .collect()
}

fn parse_program(fields: &Map<String, Value>, source_url: &str) -> Option<ProgramRecord> {
    let program_name = string_field(fields, "program_name")?;

    let category = string_field(fields, "category")
        .and_then(|c| ProgramCategory::from_db_string(&c))
        .or_else(|| ProgramCategory::infer_from_name(&program_name));
    let Some(category) = category else {
        tracing::debug!("Dropping '{}': no recognisable category", program_name);
        return None;
    };

    let application_deadline = string_field(fields, "application_deadline")
        .as_deref()
        .and_then(parse_date);

    let deadlines = match fields.get("deadlines") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .filter_map(parse_date)
            .collect(),
        _ => Vec::new(),
    };

    Some(ProgramRecord {
        program_name,
        category,
        admission_open: bool_field(fields, "admission_open"),
        application_deadline,
        deadlines,
        link: string_field(fields, "link").unwrap_or_else(|| source_url.to_string()),
        source_text: string_field(fields, "source_text").unwrap_or_default(),
        source_url: source_url.to_string(),
        university: String::new(),
    })
}

/// Returns a trimmed, non-empty string field
fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

fn bool_field(fields: &Map<String, Value>, name: &str) -> bool {
    match fields.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "open"
        ),
        _ => false,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://zu.edu.pk/admissions";

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```[1]```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn test_parse_fenced_array() {
        let raw = r#"```json
[
  {"program_name": "BS Computer Science", "category": "undergraduate",
   "admission_open": true, "application_deadline": "2025-08-15",
   "link": "https://zu.edu.pk/apply", "source_text": "Apply by 15 Aug",
   "source_url": "https://elsewhere.example"}
]
```"#;
        let records = parse_model_output(raw, URL);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.program_name, "BS Computer Science");
        assert_eq!(record.category, ProgramCategory::Undergraduate);
        assert!(record.admission_open);
        assert_eq!(
            record.application_deadline,
            NaiveDate::from_ymd_opt(2025, 8, 15)
        );
        assert_eq!(record.link, "https://zu.edu.pk/apply");
        assert_eq!(record.source_url, URL);
    }

    #[test]
    fn test_array_found_inside_prose() {
        let raw = r#"Here are the programs: [{"program_name": "MBA", "category": "masters"}] Hope this helps."#;
        let records = parse_model_output(raw, URL);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].link, URL);
        assert!(!records[0].admission_open);
    }

    #[test]
    fn test_unparsable_output_yields_empty() {
        assert!(parse_model_output("I could not find any programs.", URL).is_empty());
        assert!(parse_model_output("[{broken json", URL).is_empty());
        assert!(parse_model_output(r#"{"program_name": "BS"}"#, URL).is_empty());
        assert!(parse_model_output("", URL).is_empty());
    }

    #[test]
    fn test_missing_name_dropped() {
        let raw = r#"[{"category": "phd"}, {"program_name": "  ", "category": "phd"}, 42]"#;
        assert!(parse_model_output(raw, URL).is_empty());
    }

    #[test]
    fn test_category_inferred_when_missing_or_invalid() {
        let raw = r#"[
            {"program_name": "PhD Mathematics"},
            {"program_name": "MS Data Science", "category": "postgrad-ish"},
            {"program_name": "Open House", "category": "event"}
        ]"#;
        let records = parse_model_output(raw, URL);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, ProgramCategory::Phd);
        assert_eq!(records[1].category, ProgramCategory::Masters);
    }

    #[test]
    fn test_invalid_dates_become_null() {
        let raw = r#"[{"program_name": "BBA", "category": "undergraduate",
            "application_deadline": "31st July", "deadlines": ["2025-07-31", "soon"]}]"#;
        let records = parse_model_output(raw, URL);
        assert_eq!(records[0].application_deadline, None);
        assert_eq!(
            records[0].deadlines,
            vec![NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()]
        );
    }

    #[test]
    fn test_string_booleans_and_null_strings() {
        let raw = r#"[{"program_name": "Diploma in Nursing", "admission_open": "Yes",
            "application_deadline": "null", "link": "null"}]"#;
        let records = parse_model_output(raw, URL);
        assert_eq!(records[0].category, ProgramCategory::Diploma);
        assert!(records[0].admission_open);
        assert_eq!(records[0].application_deadline, None);
        assert_eq!(records[0].link, URL);
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_model_output("[]", URL).is_empty());
    }
}
