//! Fixed prompt sent to the extraction model

pub const SYSTEM_PROMPT: &str = "You are an expert admission information extractor. \
Your task is to extract university program information from webpage content and return it as valid JSON.";

/// Returns at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Builds the user prompt for one page
///
/// # Arguments
///
/// * `url` - The page URL, echoed back as `source_url`
/// * `text` - The page text, already truncated
pub fn build_user_prompt(url: &str, text: &str) -> String {
    format!(
        r#"Extract admission program information from this university webpage content.

URL: {url}

Return ONLY a valid JSON array of objects. Each object must have these exact fields:
- "program_name": string (full program name, e.g., "Bachelor of Science in Computer Science")
- "category": one of ["undergraduate", "masters", "phd", "certification", "diploma"]
- "admission_open": boolean (true if admissions are currently open)
- "application_deadline": string in "YYYY-MM-DD" format or null
- "deadlines": array of "YYYY-MM-DD" strings when several deadlines are listed, otherwise []
- "link": string (application/program link if available, otherwise use source URL)
- "source_text": string (relevant text excerpt from webpage)
- "source_url": "{url}"

Classification rules:
- "undergraduate": BS, Bachelor, BSc, BA, BBA, MBBS, BDS, Pharm-D, Doctor of Physical Therapy
- "masters": MS, Master, MSc, MA, MBA, MPhil
- "phd": PhD, Doctorate programs
- "certification": Short courses, certificates
- "diploma": Diploma programs

Look for:
- Program names (BS, MS, MBA, etc.)
- Application deadlines or dates
- "Apply Now", "Admission Open", "Last Date" text
- Any indication of open admissions

If no programs found, return: []

Webpage content:
{text}
"#
    )
}
