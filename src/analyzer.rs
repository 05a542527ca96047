use crate::models::{mean_of_present, Dataset, Score};
use crate::schema::{ColumnGroup, SurveySchema};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Scores(Vec<Score>),
}

/// Working set of the indicator stage: short-coded columns, all of the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyFrame {
    pub row_count: usize,
    pub columns: Vec<(String, Column)>,
}

impl SurveyFrame {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            columns: Vec::new(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&Column> {
        self.columns.iter().find(|(c, _)| c == code).map(|(_, col)| col)
    }

    pub fn text(&self, code: &str) -> Option<&[String]> {
        match self.get(code) {
            Some(Column::Text(values)) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn scores(&self, code: &str) -> Option<&[Score]> {
        match self.get(code) {
            Some(Column::Scores(values)) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Insert or replace a column.
    pub fn set(&mut self, code: &str, column: Column) {
        match self.columns.iter_mut().find(|(c, _)| c == code) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((code.to_string(), column)),
        }
    }
}

/// Keep only columns named in the rename table, under their short code and in
/// table order. Expected questions absent from the input come back as all-missing
/// columns and are listed in the second value.
pub fn rename_columns(dataset: &Dataset, schema: &SurveySchema) -> (SurveyFrame, Vec<String>) {
    let mut frame = SurveyFrame::new(dataset.len());
    let mut missing = Vec::new();

    for (label, code) in &schema.renames {
        let values = match dataset.column_index(label) {
            Some(idx) => dataset.rows.iter().map(|row| row[idx].clone()).collect(),
            None => {
                log::warn!("Column '{}' ({}) not found; treating it as missing", label, code);
                missing.push(label.clone());
                vec![String::new(); dataset.len()]
            }
        };
        frame.set(code, Column::Text(values));
    }

    (frame, missing)
}

/// Replace every scale-assigned text column with its scores. Unknown answers become missing.
pub fn map_scales(frame: &mut SurveyFrame, schema: &SurveySchema) {
    for (code, column) in frame.columns.iter_mut() {
        let Some(scale) = schema.scale_for(code) else {
            continue;
        };
        if let Column::Text(values) = column {
            let scores = values.iter().map(|v| scale.score(v)).collect();
            *column = Column::Scores(scores);
        }
    }
}

/// Per-row mean of the non-missing group members. A row without any member is missing.
pub fn composite(frame: &SurveyFrame, group: &ColumnGroup) -> Vec<Score> {
    let members: Vec<&[Score]> = group
        .members
        .iter()
        .filter_map(|code| frame.scores(code))
        .collect();

    (0..frame.row_count)
        .map(|row| mean_of_present(members.iter().map(|col| col[row])))
        .collect()
}

/// Adds a `Promedio_<group>` score column for every declared group.
pub fn add_composites(frame: &mut SurveyFrame, schema: &SurveySchema) {
    for group in &schema.groups {
        let values = composite(frame, group);
        frame.set(&group.output_column(), Column::Scores(values));
    }
}

/// Program names are typed by hand. Trim them and title-case every run of letters
/// (a letter after any non-letter is capitalized) so casing variants group together.
pub fn normalize_category(raw: &str) -> String {
    let mut previous_is_letter = false;
    let mut titled = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                titled.extend(c.to_lowercase());
            } else {
                titled.extend(c.to_uppercase());
            }
        } else {
            titled.push(c);
        }
        previous_is_letter = c.is_alphabetic();
    }
    titled
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub indicator: String,
    pub mean: Score,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryKpiRow {
    pub category: String,
    pub respondents: usize,
    /// One value per general KPI indicator, in the same order.
    pub means: Vec<Score>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    pub factor: String,
    pub mean: Score,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRow {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSummary {
    pub respondents: usize,
    pub missing_columns: Vec<String>,
    /// Output column names of the KPI indicators, e.g. `Promedio_Ind1_Tecnicas`.
    pub kpi_columns: Vec<String>,
    pub general: Vec<KpiRow>,
    pub by_category: Vec<CategoryKpiRow>,
    pub factors: Vec<FactorRow>,
    pub category_frequency: Vec<FrequencyRow>,
    pub semester_frequency: Vec<FrequencyRow>,
    pub frame: SurveyFrame,
}

pub struct IndicatorBuilder<'a> {
    pub schema: &'a SurveySchema,
}

impl<'a> IndicatorBuilder<'a> {
    pub fn new(schema: &'a SurveySchema) -> Self {
        Self { schema }
    }

    /// Rename, map and aggregate. The resulting frame also carries the normalized
    /// category column so later stages group the same way.
    pub fn prepare(&self, dataset: &Dataset) -> (SurveyFrame, Vec<String>) {
        let (mut frame, missing) = rename_columns(dataset, self.schema);
        map_scales(&mut frame, self.schema);
        add_composites(&mut frame, self.schema);

        if let Some(categories) = frame.text(&self.schema.category_column) {
            let normalized = categories.iter().map(|c| normalize_category(c)).collect();
            frame.set(&self.schema.category_column, Column::Text(normalized));
        }

        (frame, missing)
    }

    pub fn build(&self, dataset: &Dataset) -> IndicatorSummary {
        let (frame, missing_columns) = self.prepare(dataset);

        let kpi_columns: Vec<String> = self
            .schema
            .kpi_indicators
            .iter()
            .filter_map(|(code, _)| self.schema.group(code))
            .map(ColumnGroup::output_column)
            .collect();

        IndicatorSummary {
            respondents: frame.row_count,
            missing_columns,
            general: self.general_kpis(&frame),
            by_category: self.category_kpis(&frame, &kpi_columns),
            factors: self.factor_ranking(&frame),
            category_frequency: category_frequency(&frame, &self.schema.category_column),
            semester_frequency: category_frequency(&frame, &self.schema.semester_column),
            kpi_columns,
            frame,
        }
    }

    /// Dataset-level mean of each KPI indicator over respondents where it is present.
    pub fn general_kpis(&self, frame: &SurveyFrame) -> Vec<KpiRow> {
        self.schema
            .kpi_indicators
            .iter()
            .filter_map(|(code, label)| {
                let group = self.schema.group(code)?;
                let values = frame.scores(&group.output_column())?;
                Some(KpiRow {
                    indicator: label.clone(),
                    mean: mean_of_present(values.iter().copied()),
                })
            })
            .collect()
    }

    /// Per-category KPI means, only for categories with more than `min_category_size`
    /// respondents. Sorted by category name.
    pub fn category_kpis(&self, frame: &SurveyFrame, kpi_columns: &[String]) -> Vec<CategoryKpiRow> {
        let Some(categories) = frame.text(&self.schema.category_column) else {
            return Vec::new();
        };

        let mut rows_by_category: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, category) in categories.iter().enumerate() {
            if !category.is_empty() {
                rows_by_category.entry(category.as_str()).or_default().push(row);
            }
        }

        let mut result: Vec<CategoryKpiRow> = rows_by_category
            .into_iter()
            .filter(|(_, rows)| rows.len() > self.schema.min_category_size)
            .map(|(category, rows)| {
                let means = kpi_columns
                    .iter()
                    .map(|column| {
                        frame
                            .scores(column)
                            .and_then(|values| mean_of_present(rows.iter().map(|&r| values[r])))
                    })
                    .collect();
                CategoryKpiRow {
                    category: category.to_string(),
                    respondents: rows.len(),
                    means,
                }
            })
            .collect();

        result.sort_by(|a, b| a.category.cmp(&b.category));
        result
    }

    /// Mean importance of each factor question, most important first.
    pub fn factor_ranking(&self, frame: &SurveyFrame) -> Vec<FactorRow> {
        let Some(group) = self.schema.group(&self.schema.factor_group) else {
            return Vec::new();
        };

        let mut factors: Vec<FactorRow> = group
            .members
            .iter()
            .map(|code| FactorRow {
                factor: self.schema.factor_label(code).to_string(),
                mean: frame
                    .scores(code)
                    .and_then(|values| mean_of_present(values.iter().copied())),
            })
            .collect();

        // Missing means sort last; the sort is stable so ties keep question order.
        factors.sort_by(|a, b| match (a.mean, b.mean) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        factors
    }
}

/// Respondents per non-empty value of a text column, most frequent first, ties by name.
pub fn category_frequency(frame: &SurveyFrame, code: &str) -> Vec<FrequencyRow> {
    let Some(values) = frame.text(code) else {
        return Vec::new();
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut result: Vec<FrequencyRow> = counts
        .into_iter()
        .map(|(category, count)| FrequencyRow {
            category: category.to_string(),
            count,
        })
        .collect();

    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScaleKind;

    fn tiny_schema() -> SurveySchema {
        SurveySchema {
            renames: vec![
                ("Carrera?".to_string(), "Demo_Carrera".to_string()),
                ("Datos".to_string(), "A".to_string()),
                ("Ciber".to_string(), "B".to_string()),
                ("Progra".to_string(), "C".to_string()),
                ("IA".to_string(), "D".to_string()),
                ("Acuerdo".to_string(), "E".to_string()),
            ],
            groups: vec![
                ColumnGroup::new("Ind1_Tecnicas", ScaleKind::Competency, &["A", "B", "C", "D"]),
                ColumnGroup::new("Ind2_Pertinencia", ScaleKind::Agreement, &["E"]),
            ],
            kpi_indicators: vec![
                ("Ind1_Tecnicas".to_string(), "Competencias Técnicas".to_string()),
                ("Ind2_Pertinencia".to_string(), "Pertinencia Formación".to_string()),
            ],
            ..SurveySchema::default()
        }
    }

    fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_rename_drops_unknown_and_marks_missing() {
        let schema = tiny_schema();
        let data = dataset(&["Datos", "Extra", "Carrera?"], &[&["Básico", "x", "Software"]]);

        let (frame, missing) = rename_columns(&data, &schema);

        assert!(frame.get("Extra").is_none());
        assert_eq!(frame.text("A").unwrap(), &["Básico".to_string()]);
        assert_eq!(frame.text("B").unwrap(), &[String::new()]);
        assert_eq!(missing, vec!["Ciber", "Progra", "IA", "Acuerdo"]);
        let codes: Vec<&str> = frame.columns.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, vec!["Demo_Carrera", "A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_map_scales_uses_assigned_scale() {
        let schema = tiny_schema();
        let data = dataset(
            &["Datos", "Acuerdo", "Carrera?"],
            &[
                &["Experto", "Totalmente de acuerdo", "Software"],
                &["Totalmente de acuerdo", "", "Software"],
                &["4", "Neutral ", "Software"],
            ],
        );
        let (mut frame, _) = rename_columns(&data, &schema);
        map_scales(&mut frame, &schema);

        assert_eq!(frame.scores("A").unwrap(), &[Some(5.0), None, None]);
        assert_eq!(frame.scores("E").unwrap(), &[Some(5.0), None, Some(3.0)]);
        assert_eq!(frame.text("Demo_Carrera").unwrap().len(), 3);
    }

    #[test]
    fn test_composite_skips_missing_members() {
        let schema = tiny_schema();
        let data = dataset(
            &["Datos", "Ciber", "Progra", "IA"],
            &[
                &["Básico", "Avanzado", "", "Avanzado"],
                &["", "", "", ""],
                &["Experto", "Experto", "Experto", "Experto"],
            ],
        );
        let (mut frame, _) = rename_columns(&data, &schema);
        map_scales(&mut frame, &schema);

        let values = composite(&frame, schema.group("Ind1_Tecnicas").unwrap());

        assert!((values[0].unwrap() - 10.0 / 3.0).abs() < 1e-12);
        assert_eq!(values[1], None);
        assert_eq!(values[2], Some(5.0));
    }

    #[test]
    fn test_general_kpis_ignore_missing_rows() {
        let schema = tiny_schema();
        let data = dataset(
            &["Datos", "Acuerdo"],
            &[&["Básico", "De acuerdo"], &["Experto", ""], &["", ""]],
        );

        let summary = IndicatorBuilder::new(&schema).build(&data);

        assert_eq!(
            summary.general,
            vec![
                KpiRow {
                    indicator: "Competencias Técnicas".to_string(),
                    mean: Some(3.5)
                },
                KpiRow {
                    indicator: "Pertinencia Formación".to_string(),
                    mean: Some(4.0)
                },
            ]
        );
        assert_eq!(summary.kpi_columns, vec!["Promedio_Ind1_Tecnicas", "Promedio_Ind2_Pertinencia"]);
    }

    #[test]
    fn test_small_categories_are_excluded() {
        let schema = tiny_schema();
        let mut rows: Vec<&[&str]> = Vec::new();
        for _ in 0..6 {
            rows.push(&["software", "Experto"]);
        }
        for _ in 0..4 {
            rows.push(&["Civil Engineering", "Básico"]);
        }
        let data = dataset(&["Carrera?", "Datos"], &rows);

        let summary = IndicatorBuilder::new(&schema).build(&data);

        assert_eq!(summary.by_category.len(), 1);
        assert_eq!(summary.by_category[0].category, "Software");
        assert_eq!(summary.by_category[0].respondents, 6);
        assert_eq!(summary.by_category[0].means, vec![Some(5.0), None]);

        // Frequency table still lists every category.
        assert_eq!(
            summary.category_frequency,
            vec![
                FrequencyRow { category: "Software".to_string(), count: 6 },
                FrequencyRow { category: "Civil Engineering".to_string(), count: 4 },
            ]
        );
    }

    #[test]
    fn test_exactly_minimum_size_is_excluded() {
        let schema = tiny_schema();
        let rows: Vec<&[&str]> = (0..5).map(|_| &["Software", "Experto"][..]).collect();
        let data = dataset(&["Carrera?", "Datos"], &rows);

        let summary = IndicatorBuilder::new(&schema).build(&data);
        assert!(summary.by_category.is_empty());
    }

    #[test]
    fn test_factor_ranking_sorted_by_importance() {
        let schema = SurveySchema::default();
        let data = dataset(
            &[
                "Habilidades técnicas y digitales (ej. programación, análisis de datos)",
                "Experiencia práctica o pasantías",
                "Título académico de la universidad",
            ],
            &[
                &["Importante", "Muy importante", "Sin importancia"],
                &["Neutral", "Muy importante", ""],
            ],
        );

        let summary = IndicatorBuilder::new(&schema).build(&data);
        let ranking: Vec<(&str, Score)> = summary
            .factors
            .iter()
            .map(|f| (f.factor.as_str(), f.mean))
            .collect();

        assert_eq!(
            ranking,
            vec![
                ("Experiencia Práctica", Some(5.0)),
                ("Habilidades Técnicas", Some(3.5)),
                ("Título Académico", Some(1.0)),
                ("Habilidades Blandas", None),
                ("Networking", None),
            ]
        );
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  ingeniería   de SOFTWARE "), "Ingeniería   De Software");
        assert_eq!(normalize_category(""), "");
    }

    #[test]
    fn test_normalize_category_capitalizes_after_any_non_letter() {
        assert_eq!(normalize_category("agro-industria"), "Agro-Industria");
        assert_eq!(
            normalize_category("TECNOLOGÍAS DE LA INFORMACIÓN (en línea)"),
            "Tecnologías De La Información (En Línea)"
        );
        assert_eq!(normalize_category("2do semestre"), "2Do Semestre");
    }

    #[test]
    fn test_build_is_deterministic() {
        let schema = SurveySchema::default();
        let data = dataset(
            &["Por favor, escribe el nombre de tu carrera o programa de estudios.", "Fundamentos de ciberseguridad."],
            &[&["Software", "Básico"], &["Civil", "Intermedio"]],
        );
        let builder = IndicatorBuilder::new(&schema);
        assert_eq!(builder.build(&data), builder.build(&data));
    }
}
