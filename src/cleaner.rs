use crate::models::Dataset;
use crate::normalizer::InstitutionNormalizer;
use crate::schema::SurveySchema;
use crate::tabular::PipelineError;
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;

/// Drop exact full-row duplicates, keeping the first occurrence in order.
/// Returns the kept rows and how many were removed.
pub fn deduplicate(rows: Vec<Vec<String>>) -> (Vec<Vec<String>>, usize) {
    let original_count = rows.len();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        if !seen.contains(&row) {
            seen.insert(row.clone());
            kept.push(row);
        }
    }

    let removed = original_count - kept.len();
    (kept, removed)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub rows: Vec<Vec<String>>,
    pub discarded: usize,
    /// (original text, canonical value) for each kept row whose text differed.
    pub changes: Vec<(String, String)>,
}

/// Keep rows whose institution normalizes to the canonical name and overwrite
/// that cell with it. Other cells are left as they are.
pub fn filter_institution(
    rows: Vec<Vec<String>>,
    column: usize,
    normalizer: &InstitutionNormalizer,
) -> FilterOutcome {
    let total = rows.len();
    let mut kept = Vec::new();
    let mut changes = Vec::new();

    for mut row in rows {
        let original = row.get(column).cloned().unwrap_or_default();
        let normalized = normalizer.normalize(&original);
        if !normalized.is_canonical() {
            continue;
        }

        let canonical = normalized.into_value();
        if original != canonical {
            changes.push((original, canonical.clone()));
        }
        row[column] = canonical;
        kept.push(row);
    }

    FilterOutcome {
        discarded: total - kept.len(),
        rows: kept,
        changes,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReport {
    pub column: String,
    pub canonical: String,
    pub rows_read: usize,
    pub duplicates_removed: usize,
    pub rows_after_dedup: usize,
    pub missing_institution: usize,
    pub rows_kept: usize,
    pub rows_discarded: usize,
    pub values_normalized: usize,
    /// Distinct before/after pairs in first-seen order, capped at the preview limit.
    pub preview: Vec<(String, String)>,
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleaning report for column '{}'", self.column)?;
        writeln!(f, "========================================")?;
        writeln!(f, "Rows read: {}", self.rows_read)?;
        writeln!(f, "Duplicates removed: {}", self.duplicates_removed)?;
        writeln!(f, "Rows after deduplication: {}", self.rows_after_dedup)?;
        writeln!(f, "Missing institution values: {}", self.missing_institution)?;
        writeln!(f, "Rows kept ({}): {}", self.canonical, self.rows_kept)?;
        writeln!(f, "Rows discarded (other institutions or empty): {}", self.rows_discarded)?;
        writeln!(f, "Values needing normalization: {}", self.values_normalized)?;

        if self.preview.is_empty() {
            writeln!(
                f,
                "No normalization needed: every kept row already read '{}'.",
                self.canonical
            )?;
        } else {
            writeln!(f, "Normalization examples (before -> after):")?;
            for (before, after) in &self.preview {
                writeln!(f, "  '{}' -> '{}'", before, after)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub dataset: Dataset,
    pub report: CleaningReport,
}

/// Deduplicate, normalize and filter the raw export down to the canonical institution.
pub fn clean_dataset(dataset: Dataset, schema: &SurveySchema) -> Result<CleaningOutcome> {
    let column = dataset
        .column_index(&schema.institution_column)
        .ok_or_else(|| PipelineError::MissingColumn {
            column: schema.institution_column.clone(),
            available: dataset.headers.clone(),
        })?;

    let normalizer =
        InstitutionNormalizer::new(&schema.canonical_institution, &schema.institution_variants)?;

    let Dataset { headers, rows } = dataset;
    let rows_read = rows.len();

    let (rows, duplicates_removed) = deduplicate(rows);
    let rows_after_dedup = rows.len();
    log::info!("Removed {} duplicate rows", duplicates_removed);

    let missing_institution = rows
        .iter()
        .filter(|row| row[column].trim().is_empty())
        .count();

    let outcome = filter_institution(rows, column, &normalizer);
    log::info!(
        "Kept {} '{}' rows, discarded {}",
        outcome.rows.len(),
        normalizer.canonical(),
        outcome.discarded
    );

    let mut preview: Vec<(String, String)> = Vec::new();
    for change in &outcome.changes {
        if preview.len() >= schema.report_preview_limit {
            break;
        }
        if !preview.contains(change) {
            preview.push(change.clone());
        }
    }

    let report = CleaningReport {
        column: schema.institution_column.clone(),
        canonical: normalizer.canonical().to_string(),
        rows_read,
        duplicates_removed,
        rows_after_dedup,
        missing_institution,
        rows_kept: outcome.rows.len(),
        rows_discarded: outcome.discarded,
        values_normalized: outcome.changes.len(),
        preview,
    };

    Ok(CleaningOutcome {
        dataset: Dataset {
            headers,
            rows: outcome.rows,
        },
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn schema_with_column(column: &str) -> SurveySchema {
        SurveySchema {
            institution_column: column.to_string(),
            ..SurveySchema::default()
        }
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence_order() {
        let rows = vec![
            row(&["a", "1"]),
            row(&["b", "2"]),
            row(&["a", "1"]),
            row(&["c", "3"]),
            row(&["b", "2"]),
        ];
        let (kept, removed) = deduplicate(rows);
        assert_eq!(kept, vec![row(&["a", "1"]), row(&["b", "2"]), row(&["c", "3"])]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_deduplicate_only_removes_full_row_matches() {
        let rows = vec![row(&["a", "1"]), row(&["a", "2"]), row(&["a", ""])];
        let (kept, removed) = deduplicate(rows.clone());
        assert_eq!(kept, rows);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_institution_scenario() {
        let dataset = Dataset::new(
            vec!["Uni".to_string()],
            vec![
                row(&["ESC SUP POLITECNICA DE CHIMBORAZO"]),
                row(&["Harvard"]),
                row(&["espoch"]),
            ],
        );

        let outcome = clean_dataset(dataset, &schema_with_column("Uni")).unwrap();

        assert_eq!(outcome.dataset.rows, vec![row(&["ESPOCH"]), row(&["ESPOCH"])]);
        assert_eq!(outcome.report.rows_kept, 2);
        assert_eq!(outcome.report.rows_discarded, 1);
        assert_eq!(outcome.report.values_normalized, 2);
    }

    #[test]
    fn test_filter_leaves_other_fields_untouched() {
        let normalizer = InstitutionNormalizer::new(
            "ESPOCH",
            &SurveySchema::default().institution_variants,
        )
        .unwrap();
        let rows = vec![
            row(&["  Politécnica de Chimborazo ", "Software", "  Básico "]),
            row(&["Otra", "Civil", "Experto"]),
            row(&["", "Civil", "Experto"]),
        ];

        let outcome = filter_institution(rows, 0, &normalizer);

        assert_eq!(outcome.rows, vec![row(&["ESPOCH", "Software", "  Básico "])]);
        assert_eq!(outcome.discarded, 2);
        assert!(outcome.rows.iter().all(|r| r[0] == "ESPOCH"));
    }

    #[test]
    fn test_report_counts_and_preview() {
        let mut rows = vec![
            row(&["espoch", "x"]),
            row(&["espoch", "x"]),
            row(&["ESPOCH", "y"]),
            row(&["", "z"]),
            row(&["UTA", "w"]),
        ];
        for i in 0..15 {
            rows.push(row(&["Escuela Superior Politécnica de Chimborazo", &i.to_string()]));
        }
        let dataset = Dataset::new(vec!["Uni".to_string(), "id".to_string()], rows);

        let report = clean_dataset(dataset, &schema_with_column("Uni")).unwrap().report;

        assert_eq!(report.rows_read, 20);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.rows_after_dedup, 19);
        assert_eq!(report.missing_institution, 1);
        assert_eq!(report.rows_kept, 17);
        assert_eq!(report.rows_discarded, 2);
        assert_eq!(report.values_normalized, 16);
        assert_eq!(
            report.preview,
            vec![
                ("espoch".to_string(), "ESPOCH".to_string()),
                (
                    "Escuela Superior Politécnica de Chimborazo".to_string(),
                    "ESPOCH".to_string()
                ),
            ]
        );

        let text = report.to_string();
        assert!(text.contains("Rows kept (ESPOCH): 17"));
        assert!(text.contains("'espoch' -> 'ESPOCH'"));
    }

    #[test]
    fn test_preview_is_capped() {
        let rows = (0..30)
            .map(|i| row(&[&format!("espoch{}", "!".repeat(i))]))
            .collect();
        let dataset = Dataset::new(vec!["Uni".to_string()], rows);

        let report = clean_dataset(dataset, &schema_with_column("Uni")).unwrap().report;

        assert_eq!(report.values_normalized, 30);
        assert_eq!(report.preview.len(), 10);
    }

    #[test]
    fn test_missing_institution_column_aborts() {
        let dataset = Dataset::new(vec!["Carrera".to_string()], vec![row(&["Software"])]);
        let err = clean_dataset(dataset, &schema_with_column("Uni")).unwrap_err();

        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::MissingColumn { column, available }) => {
                assert_eq!(column, "Uni");
                assert_eq!(available, &vec!["Carrera".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
