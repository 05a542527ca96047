use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    // Normalizer stage
    pub raw_export: String,
    pub cleaned_xlsx: String,
    pub cleaned_csv: String,
    pub report_file: String,
    // Indicator stage
    pub analysis_input: Option<String>,
    pub output_directory: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_export: "encuesta_export.xlsx".to_string(),
            cleaned_xlsx: "encuesta_limpia_ESPOCH.xlsx".to_string(),
            cleaned_csv: "encuesta_limpia_ESPOCH.csv".to_string(),
            report_file: "reporte_limpieza_ESPOCH.log".to_string(),
            analysis_input: None,
            output_directory: Some("output".to_string()),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    /// The indicator stage reads the cleaned workbook unless told otherwise.
    pub fn analysis_input(&self) -> &str {
        self.analysis_input.as_deref().unwrap_or(&self.cleaned_xlsx)
    }

    pub fn output_directory(&self) -> &str {
        self.output_directory.as_deref().unwrap_or("output")
    }
}

/// A survey export held in memory: one header row and text cells.
/// A missing answer is stored as an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == label)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Missing-aware cell value after scale mapping.
pub type Score = Option<f64>;

/// Arithmetic mean of the present values; `None` when nothing is present.
pub fn mean_of_present<I>(values: I) -> Score
where
    I: IntoIterator<Item = Score>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
