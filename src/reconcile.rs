//! Reconciliation of extracted programs against human corrections
//!
//! Extraction output is deduplicated, overlaid with the stored corrections
//! and persisted. Corrected values always win; every disagreement between
//! the model and a reviewer is reported as a `Divergence`.

use crate::model::{
    format_deadlines, CorrectionRecord, Divergence, DivergentField, FieldDivergence,
    ProgramKey, ProgramRecord,
};
use crate::storage::{ProgramStore, UpsertOutcome};
use serde::Serialize;
use std::collections::HashMap;

/// Final records plus the divergences found while producing them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<ProgramRecord>,
    pub divergences: Vec<Divergence>,
}

/// Counts from persisting one batch of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PersistReport {
    /// Records written or confirmed in the store
    pub fn upserted(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Merges extracted records with the stored corrections
///
/// Duplicates (same university and normalised program name) collapse to the
/// last one seen, kept at the position of the first. Corrections are looked
/// up by exact program name.
///
/// # Arguments
///
/// * `extracted` - Records in extraction order
/// * `corrections` - Corrections for the university, keyed by program name
pub fn reconcile(
    extracted: Vec<ProgramRecord>,
    corrections: &HashMap<String, CorrectionRecord>,
) -> Reconciliation {
    let mut positions: HashMap<ProgramKey, usize> = HashMap::new();
    let mut records: Vec<ProgramRecord> = Vec::with_capacity(extracted.len());

    for record in extracted {
        match positions.get(&record.key()) {
            Some(&idx) => {
                tracing::debug!("Duplicate program '{}', keeping latest", record.program_name);
                records[idx] = record;
            }
            None => {
                positions.insert(record.key(), records.len());
                records.push(record);
            }
        }
    }

    let mut divergences = Vec::new();
    for record in &mut records {
        let Some(correction) = corrections.get(&record.program_name) else {
            continue;
        };

        if let Some(divergence) = compare(record, correction) {
            divergences.push(divergence);
        }
        record.apply_correction(correction);
    }

    Reconciliation {
        records,
        divergences,
    }
}

/// Returns the divergence between a record and its correction, if any
fn compare(record: &ProgramRecord, correction: &CorrectionRecord) -> Option<Divergence> {
    let mut fields = Vec::new();

    if record.category != correction.category {
        fields.push(FieldDivergence {
            field: DivergentField::Category,
            extracted: record.category.to_string(),
            corrected: correction.category.to_string(),
        });
    }

    if record.admission_open != correction.admission_open {
        fields.push(FieldDivergence {
            field: DivergentField::AdmissionOpen,
            extracted: record.admission_open.to_string(),
            corrected: correction.admission_open.to_string(),
        });
    }

    let extracted_deadlines = record.effective_deadlines();
    if extracted_deadlines != correction.deadlines {
        fields.push(FieldDivergence {
            field: DivergentField::Deadlines,
            extracted: format_deadlines(&extracted_deadlines),
            corrected: format_deadlines(&correction.deadlines),
        });
    }

    if fields.is_empty() {
        return None;
    }

    Some(Divergence {
        university: record.university.clone(),
        program_name: record.program_name.clone(),
        fields,
    })
}

/// Upserts every record, skipping the ones the store rejects
pub fn persist<S: ProgramStore + ?Sized>(records: &[ProgramRecord], store: &S) -> PersistReport {
    let mut report = PersistReport::default();

    for record in records {
        match store.upsert_program(record) {
            Ok(UpsertOutcome::Inserted) => report.inserted += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                tracing::warn!(
                    "Failed to persist '{}' for {}: {}",
                    record.program_name,
                    record.university,
                    e
                );
                report.failed += 1;
            }
        }
    }

    report
}
