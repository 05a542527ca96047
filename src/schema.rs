//! Fixed survey configuration: the institution variants, the answer scales,
//! the question rename table and the indicator groups.
//!
//! None of this is read at runtime. `SurveySchema::default()` describes the
//! employability survey; tests build smaller schemas by hand.

use std::collections::{HashMap, HashSet};

/// Label of the free-text institution question in the raw export.
pub const INSTITUTION_COLUMN: &str = "¿En qué universidad estudias actualmente?";

pub const CANONICAL_INSTITUTION: &str = "ESPOCH";

/// Spellings that mean ESPOCH once accents, case and punctuation are stripped.
pub const INSTITUTION_VARIANTS: &[&str] = &[
    "espoch",
    "escuela superior politecnica de chimborazo",
    "esc sup politec chimborazo",
    "esc sup politecnica de chimborazo",
    "politecnica de chimborazo",
    "escuela superior politecnica chimborazo",
    "epoch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleKind {
    Competency,
    Agreement,
    Importance,
}

/// Closed text label -> 1..=5 lookup for one ordinal answer scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleLookup {
    pub kind: ScaleKind,
    labels: HashMap<String, u8>,
}

impl ScaleLookup {
    pub fn new(kind: ScaleKind, labels: &[(&str, u8)]) -> Self {
        Self {
            kind,
            labels: labels
                .iter()
                .map(|(label, value)| (label.to_string(), *value))
                .collect(),
        }
    }

    pub fn competency() -> Self {
        Self::new(
            ScaleKind::Competency,
            &[
                ("Ninguno", 1),
                ("Básico", 2),
                ("Intermedio", 3),
                ("Avanzado", 4),
                ("Experto", 5),
            ],
        )
    }

    pub fn agreement() -> Self {
        Self::new(
            ScaleKind::Agreement,
            &[
                ("Totalmente en desacuerdo", 1),
                ("En desacuerdo", 2),
                ("Neutral", 3),
                ("De acuerdo", 4),
                ("Totalmente de acuerdo", 5),
            ],
        )
    }

    pub fn importance() -> Self {
        Self::new(
            ScaleKind::Importance,
            &[
                ("Sin importancia", 1),
                ("Poca importancia", 2),
                ("Neutral", 3),
                ("Importante", 4),
                ("Muy importante", 5),
            ],
        )
    }

    /// Surrounding whitespace is ignored; anything else must match a label exactly.
    pub fn score(&self, answer: &str) -> Option<f64> {
        self.labels.get(answer.trim()).map(|v| f64::from(*v))
    }
}

/// Named, ordered list of short codes averaged into one composite indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    pub code: String,
    pub scale: ScaleKind,
    pub members: Vec<String>,
}

impl ColumnGroup {
    pub fn new(code: &str, scale: ScaleKind, members: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            scale,
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Column name of the composite in output tables.
    pub fn output_column(&self) -> String {
        format!("Promedio_{}", self.code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Hypothesis {
    Correlation {
        id: String,
        title: String,
        x: String,
        y: String,
    },
    GroupDifference {
        id: String,
        title: String,
        value: String,
        category: String,
    },
}

impl Hypothesis {
    pub fn id(&self) -> &str {
        match self {
            Hypothesis::Correlation { id, .. } | Hypothesis::GroupDifference { id, .. } => id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Hypothesis::Correlation { title, .. } | Hypothesis::GroupDifference { title, .. } => {
                title
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurveySchema {
    pub institution_column: String,
    pub canonical_institution: String,
    pub institution_variants: HashSet<String>,
    pub competency: ScaleLookup,
    pub agreement: ScaleLookup,
    pub importance: ScaleLookup,
    /// Verbose question label -> short code, in output order.
    pub renames: Vec<(String, String)>,
    pub groups: Vec<ColumnGroup>,
    /// Group codes reported in the general KPI table, with display labels.
    pub kpi_indicators: Vec<(String, String)>,
    /// Group whose members are ranked individually as employability factors.
    pub factor_group: String,
    pub factor_labels: HashMap<String, String>,
    pub category_column: String,
    pub semester_column: String,
    pub min_category_size: usize,
    pub significance_level: f64,
    pub report_preview_limit: usize,
    pub hypotheses: Vec<Hypothesis>,
}

impl SurveySchema {
    pub fn scale(&self, kind: ScaleKind) -> &ScaleLookup {
        match kind {
            ScaleKind::Competency => &self.competency,
            ScaleKind::Agreement => &self.agreement,
            ScaleKind::Importance => &self.importance,
        }
    }

    pub fn group(&self, code: &str) -> Option<&ColumnGroup> {
        self.groups.iter().find(|g| g.code == code)
    }

    /// Which scale a short code is mapped through, if any.
    pub fn scale_for(&self, code: &str) -> Option<&ScaleLookup> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m == code))
            .map(|g| self.scale(g.scale))
    }

    pub fn factor_label<'a>(&'a self, code: &'a str) -> &'a str {
        self.factor_labels.get(code).map(String::as_str).unwrap_or(code)
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

impl Default for SurveySchema {
    fn default() -> Self {
        let renames = pairs(&[
            ("Por favor, escribe el nombre de tu carrera o programa de estudios.", "Demo_Carrera"),
            ("¿Qué semestre estás cursando actualmente?", "Demo_Semestre"),
            ("¿Cuál es tu edad?", "Demo_Edad"),
            ("¿Con qué género te identificas?", "Demo_Genero"),
            ("Análisis e interpretación de datos.", "P1_Analisis_Datos"),
            ("Fundamentos de ciberseguridad.", "P1_Ciberseguridad"),
            ("Conceptos básicos de programación y automatización.", "P1_Programacion"),
            ("Manejo de herramientas de IA (ej. ChatGPT, Copilot, Gemini, DALL-E)", "P1_Manejo_IA"),
            ("Pensamiento crítico y resolución de problemas complejos", "P2_Pensamiento_Critico"),
            ("Comunicación efectiva en entornos digitales", "P2_Comunicacion_Digital"),
            ("Adaptabilidad y aprendizaje continuo", "P2_Adaptabilidad"),
            ("Creatividad e innovación", "P2_Creatividad"),
            ("Colaboración en equipos multidisciplinarios", "P2_Colaboracion"),
            ("El currículo de mi carrera está alineado con las habilidades demandadas por el mercado laboral digital.", "P3_Curriculo_Alineado"),
            ("Mi universidad promueve activamente el desarrollo de competencias digitales y blandas.", "P3_Promueve_Competencias"),
            ("Siento que la formación que he recibido me prepara para trabajos que aún no existen.", "P3_Prepara_Futuro"),
            ("El uso de la tecnología y la IA está bien integrado en las asignaturas de mi carrera.", "P3_IA_Integrada"),
            ("La metodología de enseñanza en mi carrera fomenta la adaptabilidad y el aprendizaje continuo.", "P3_Metodologia_Adaptable"),
            ("Me siento seguro(a) de que mi formación académica me prepara para conseguir un empleo relevante en mi área.", "P4_Confianza_Empleo"),
            ("Mi perfil de egreso es competitivo en el mercado laboral actual.", "P4_Perfil_Competitivo"),
            ("Considero que mis habilidades blandas (ej. comunicación, creatividad) me dan una ventaja en el mercado laboral.", "P4_Ventaja_Blandas"),
            ("Creo que mi conocimiento sobre herramientas de IA mejorará mis oportunidades laborales.", "P4_IA_Oportunidades"),
            ("Habilidades técnicas y digitales (ej. programación, análisis de datos)", "P5_Factor_Tecnicas"),
            ("Habilidades blandas (ej. pensamiento crítico, adaptabilidad)", "P5_Factor_Blandas"),
            ("Experiencia práctica o pasantías", "P5_Factor_Experiencia"),
            ("Red de contactos (networking)", "P5_Factor_Networking"),
            ("Título académico de la universidad", "P5_Factor_Titulo"),
            ("El profesorado de mi carrera está capacitado para integrar herramientas de IA en la enseñanza.", "P6_Profesor_Capacitado_IA"),
            ("Mi universidad fomenta la innovación en las metodologías de enseñanza para adaptarse a la era digital.", "P6_Universidad_Innova"),
            ("Mi universidad tiene los recursos adecuados (plataformas, software) para formar profesionales en la era digital.", "P6_Recursos_Adecuados"),
            ("En general, recomendaría mi universidad como una institución que prepara para los desafíos del mercado laboral digital.", "P6_Recomendaria_Universidad"),
        ]);

        let groups = vec![
            ColumnGroup::new(
                "Ind1_Tecnicas",
                ScaleKind::Competency,
                &["P1_Analisis_Datos", "P1_Ciberseguridad", "P1_Programacion", "P1_Manejo_IA"],
            ),
            ColumnGroup::new(
                "Ind1_Blandas",
                ScaleKind::Competency,
                &[
                    "P2_Pensamiento_Critico",
                    "P2_Comunicacion_Digital",
                    "P2_Adaptabilidad",
                    "P2_Creatividad",
                    "P2_Colaboracion",
                ],
            ),
            ColumnGroup::new(
                "Ind2_Pertinencia",
                ScaleKind::Agreement,
                &[
                    "P3_Curriculo_Alineado",
                    "P3_Promueve_Competencias",
                    "P3_Prepara_Futuro",
                    "P3_IA_Integrada",
                    "P3_Metodologia_Adaptable",
                ],
            ),
            ColumnGroup::new(
                "Ind3_Confianza",
                ScaleKind::Agreement,
                &[
                    "P4_Confianza_Empleo",
                    "P4_Perfil_Competitivo",
                    "P4_Ventaja_Blandas",
                    "P4_IA_Oportunidades",
                ],
            ),
            ColumnGroup::new(
                "Ind3_Factores",
                ScaleKind::Importance,
                &[
                    "P5_Factor_Tecnicas",
                    "P5_Factor_Blandas",
                    "P5_Factor_Experiencia",
                    "P5_Factor_Networking",
                    "P5_Factor_Titulo",
                ],
            ),
            ColumnGroup::new(
                "Ind4_Universidad",
                ScaleKind::Agreement,
                &[
                    "P6_Profesor_Capacitado_IA",
                    "P6_Universidad_Innova",
                    "P6_Recursos_Adecuados",
                    "P6_Recomendaria_Universidad",
                ],
            ),
        ];

        let kpi_indicators = pairs(&[
            ("Ind1_Tecnicas", "Competencias Técnicas"),
            ("Ind1_Blandas", "Competencias Blandas"),
            ("Ind2_Pertinencia", "Pertinencia Formación"),
            ("Ind3_Confianza", "Confianza Empleabilidad"),
            ("Ind4_Universidad", "Percepción Universidad"),
        ]);

        let factor_labels = pairs(&[
            ("P5_Factor_Tecnicas", "Habilidades Técnicas"),
            ("P5_Factor_Blandas", "Habilidades Blandas"),
            ("P5_Factor_Experiencia", "Experiencia Práctica"),
            ("P5_Factor_Networking", "Networking"),
            ("P5_Factor_Titulo", "Título Académico"),
        ])
        .into_iter()
        .collect();

        let hypotheses = vec![
            Hypothesis::Correlation {
                id: "H1".to_string(),
                title: "Competencias Digitales vs Percepción Impacto IA".to_string(),
                x: "Promedio_Ind1_Tecnicas".to_string(),
                y: "P4_IA_Oportunidades".to_string(),
            },
            Hypothesis::Correlation {
                id: "H2".to_string(),
                title: "Competencias Digitales vs Pertinencia de Formación".to_string(),
                x: "Promedio_Ind1_Tecnicas".to_string(),
                y: "Promedio_Ind2_Pertinencia".to_string(),
            },
            Hypothesis::GroupDifference {
                id: "H3".to_string(),
                title: "Diferencias de Competencias Digitales por Carrera".to_string(),
                value: "Promedio_Ind1_Tecnicas".to_string(),
                category: "Demo_Carrera".to_string(),
            },
            Hypothesis::Correlation {
                id: "H4".to_string(),
                title: "Percepción IA vs Dominio en Análisis de Datos".to_string(),
                x: "P4_IA_Oportunidades".to_string(),
                y: "P1_Analisis_Datos".to_string(),
            },
            Hypothesis::Correlation {
                id: "H5".to_string(),
                title: "Competencias Digitales vs Dominio en Análisis de Datos".to_string(),
                x: "Promedio_Ind1_Tecnicas".to_string(),
                y: "P1_Analisis_Datos".to_string(),
            },
        ];

        Self {
            institution_column: INSTITUTION_COLUMN.to_string(),
            canonical_institution: CANONICAL_INSTITUTION.to_string(),
            institution_variants: INSTITUTION_VARIANTS.iter().map(|v| v.to_string()).collect(),
            competency: ScaleLookup::competency(),
            agreement: ScaleLookup::agreement(),
            importance: ScaleLookup::importance(),
            renames,
            groups,
            kpi_indicators,
            factor_group: "Ind3_Factores".to_string(),
            factor_labels,
            category_column: "Demo_Carrera".to_string(),
            semester_column: "Demo_Semestre".to_string(),
            min_category_size: 5,
            significance_level: 0.05,
            report_preview_limit: 10,
            hypotheses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_scale_maps_canonical_labels() {
        let scale = ScaleLookup::agreement();
        assert_eq!(scale.score("Totalmente de acuerdo"), Some(5.0));
        assert_eq!(scale.score("Totalmente en desacuerdo"), Some(1.0));
        assert_eq!(scale.score("  De acuerdo "), Some(4.0));
    }

    #[test]
    fn test_unknown_answers_are_missing() {
        let scale = ScaleLookup::competency();
        assert_eq!(scale.score(""), None);
        assert_eq!(scale.score("4"), None);
        assert_eq!(scale.score("basico"), None);
        assert_eq!(scale.score("nan"), None);
    }

    #[test]
    fn test_every_group_member_is_renamed_from_a_question() {
        let schema = SurveySchema::default();
        for group in &schema.groups {
            for member in &group.members {
                assert!(
                    schema.renames.iter().any(|(_, code)| code == member),
                    "{} has no source question",
                    member
                );
            }
        }
    }

    #[test]
    fn test_scale_assignment() {
        let schema = SurveySchema::default();
        assert_eq!(schema.scale_for("P1_Programacion").unwrap().kind, ScaleKind::Competency);
        assert_eq!(schema.scale_for("P3_IA_Integrada").unwrap().kind, ScaleKind::Agreement);
        assert_eq!(schema.scale_for("P5_Factor_Titulo").unwrap().kind, ScaleKind::Importance);
        assert!(schema.scale_for("Demo_Carrera").is_none());
    }

    #[test]
    fn test_factor_label_falls_back_to_code() {
        let schema = SurveySchema::default();
        assert_eq!(schema.factor_label("P5_Factor_Titulo"), "Título Académico");
        assert_eq!(schema.factor_label("P5_Otro"), "P5_Otro");
    }
}
