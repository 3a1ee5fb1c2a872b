//! Completion summary printed after a harvest

use crate::model::RunSummary;

/// Formats the per-university completion summary
pub fn format_run_summary(summaries: &[RunSummary]) -> String {
    let mut out = String::new();
    out.push_str("=== Harvest Summary ===\n\n");

    for summary in summaries {
        out.push_str(&format!("{}:\n", summary.university));
        out.push_str(&format!("  Pages fetched: {}\n", summary.pages_fetched));
        out.push_str(&format!(
            "  Pages rejected (thin content): {}\n",
            summary.pages_rejected
        ));
        out.push_str(&format!(
            "  Pages skipped (already visited): {}\n",
            summary.pages_skipped_visited
        ));
        if summary.fetch_failures > 0 {
            out.push_str(&format!("  Fetch failures: {}\n", summary.fetch_failures));
        }
        out.push_str(&format!(
            "  Programs extracted: {}\n",
            summary.programs_extracted
        ));
        out.push_str(&format!("  Divergences found: {}\n", summary.divergences));
        out.push_str(&format!("  Records upserted: {}\n", summary.records_upserted));
        if summary.records_failed > 0 {
            out.push_str(&format!("  Records failed: {}\n", summary.records_failed));
        }
        out.push('\n');
    }

    let total_upserted: usize = summaries.iter().map(|s| s.records_upserted).sum();
    let total_divergences: usize = summaries.iter().map(|s| s.divergences).sum();
    out.push_str(&format!(
        "Total: {} record(s) upserted, {} divergence(s) across {} universit{}\n",
        total_upserted,
        total_divergences,
        summaries.len(),
        if summaries.len() == 1 { "y" } else { "ies" }
    ));

    out
}

/// Prints the completion summary to stdout
pub fn print_run_summary(summaries: &[RunSummary]) {
    print!("{}", format_run_summary(summaries));
}
