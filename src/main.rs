mod analyzer;
mod cleaner;
mod models;
mod normalizer;
mod schema;
mod stats;
mod tabular;

use analyzer::{FrequencyRow, IndicatorBuilder, IndicatorSummary};
use anyhow::{Context, Result};
use clap::{Arg, Command};
use log::LevelFilter;
use models::{Config, Score};
use schema::SurveySchema;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Log output always goes to the console, and to the cleaning report file while one
/// is attached. Only the cleaning stage attaches it.
#[derive(Clone, Default)]
struct ReportSink {
    file: Arc<Mutex<Option<File>>>,
}

impl ReportSink {
    fn attach(&self, path: &str) -> Result<()> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open report file: {}", path))?;
        *self.file.lock().unwrap_or_else(|e| e.into_inner()) = Some(file);
        Ok(())
    }

    fn detach(&self) {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn init_logging(sink: &ReportSink) {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(buf, "{} - {} - {}", buf.timestamp(), record.level(), record.args())
        })
        .target(env_logger::Target::Pipe(Box::new(sink.clone())))
        .init();
}

fn main() -> Result<()> {
    let matches = Command::new("survey-indicators")
        .version("0.1.0")
        .about("Cleans the employability survey export and builds its indicators")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("clean").about("Normalize institution names, deduplicate and filter the raw export"))
        .subcommand(Command::new("indicators").about("Build composite indicators and summary tables from the cleaned file"))
        .subcommand(Command::new("hypotheses").about("Run correlation and ANOVA tests on the cleaned file"))
        .subcommand(Command::new("all").about("Run clean, indicators and hypotheses in sequence"))
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please edit {} and set the input file paths, then run the program again.", config_file);
        return Ok(());
    };

    let schema = SurveySchema::default();
    let sink = ReportSink::default();
    init_logging(&sink);

    match matches.subcommand_name() {
        Some("clean") => run_clean_with_report(&config, &schema, &sink)?,
        Some("indicators") => run_indicators(&config, &schema)?,
        Some("hypotheses") => run_hypotheses(&config, &schema)?,
        Some("all") => {
            run_clean_with_report(&config, &schema, &sink)?;
            run_indicators(&config, &schema)?;
            run_hypotheses(&config, &schema)?;
        }
        _ => unreachable!("clap requires a subcommand"),
    }

    Ok(())
}

/// The report file receives the cleaning stage's log lines and nothing else.
fn run_clean_with_report(config: &Config, schema: &SurveySchema, sink: &ReportSink) -> Result<()> {
    sink.attach(&config.report_file)?;
    let result = run_clean(config, schema);
    sink.detach();
    result
}

fn run_clean(config: &Config, schema: &SurveySchema) -> Result<()> {
    log::info!("--- Starting institution cleaning and filtering ---");

    let dataset = match tabular::read_table(&config.raw_export) {
        Ok(dataset) => dataset,
        Err(e) => {
            log::error!("Failed to load raw export '{}': {:#}", config.raw_export, e);
            return Err(e.context(format!("Failed to load raw export '{}'", config.raw_export)));
        }
    };
    log::info!("Loaded '{}' with {} rows", config.raw_export, dataset.len());

    let outcome = match cleaner::clean_dataset(dataset, schema) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{:#}", e);
            return Err(e);
        }
    };

    for line in outcome.report.to_string().lines() {
        log::info!("{}", line);
    }

    tabular::write_xlsx(&outcome.dataset, &config.cleaned_xlsx)?;
    tabular::write_csv(&outcome.dataset, &config.cleaned_csv)?;

    log::info!("Cleaned workbook saved to '{}'", config.cleaned_xlsx);
    log::info!("Cleaned CSV saved to '{}'", config.cleaned_csv);
    log::info!("Cleaning report saved to '{}'", config.report_file);
    log::info!("--- Cleaning finished ---");
    Ok(())
}

fn run_indicators(config: &Config, schema: &SurveySchema) -> Result<()> {
    let input = config.analysis_input();
    let output_dir = config.output_directory();

    println!("🔍 Building indicators from: {}", input);
    let dataset = tabular::read_table(input)
        .with_context(|| format!("Failed to load cleaned survey '{}'", input))?;

    let summary = IndicatorBuilder::new(schema).build(&dataset);

    fs::create_dir_all(output_dir)?;
    generate_general_kpi_csv(&summary, output_dir)?;
    generate_category_kpi_csv(&summary, schema, output_dir)?;
    generate_factor_ranking_csv(&summary, output_dir)?;
    generate_frequency_csv(&summary.category_frequency, "Carrera", output_dir, "category_frequency.csv")?;
    generate_frequency_csv(&summary.semester_frequency, "Semestre", output_dir, "semester_frequency.csv")?;
    generate_respondent_indicators_csv(&summary, schema, output_dir)?;

    print_summary(&summary);
    println!("📂 Summary tables written to: {}", output_dir);
    Ok(())
}

fn run_hypotheses(config: &Config, schema: &SurveySchema) -> Result<()> {
    let input = config.analysis_input();
    let dataset = tabular::read_table(input)
        .with_context(|| format!("Failed to load cleaned survey '{}'", input))?;

    let (frame, _) = IndicatorBuilder::new(schema).prepare(&dataset);

    println!("\n🧪 HYPOTHESIS TESTS (alpha = {})", schema.significance_level);
    println!("==========================\n");
    let results = stats::run_hypotheses(&frame, schema);
    for result in &results {
        println!("--- {}: {} ---", result.id, result.title);
        println!("{}\n", result.verdict);
    }

    let validated = results.iter().filter(|r| r.verdict.is_validated()).count();
    println!("✅ {} of {} hypotheses validated", validated, results.len());
    Ok(())
}

fn format_score(score: Score) -> String {
    score.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn generate_general_kpi_csv(summary: &IndicatorSummary, output_dir: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(Path::new(output_dir).join("kpi_general.csv"))?;

    writer.write_record(["Indicador", "Promedio"])?;
    for row in &summary.general {
        writer.write_record([row.indicator.as_str(), format_score(row.mean).as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

fn generate_category_kpi_csv(
    summary: &IndicatorSummary,
    schema: &SurveySchema,
    output_dir: &str,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(Path::new(output_dir).join("kpi_by_category.csv"))?;

    let mut headers = vec![schema.category_column.clone()];
    headers.extend(summary.kpi_columns.iter().cloned());
    writer.write_record(&headers)?;

    for row in &summary.by_category {
        let mut record = vec![row.category.clone()];
        record.extend(row.means.iter().map(|m| format_score(*m)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn generate_factor_ranking_csv(summary: &IndicatorSummary, output_dir: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(Path::new(output_dir).join("factor_ranking.csv"))?;

    writer.write_record(["Factor", "Importancia_Promedio"])?;
    for row in &summary.factors {
        writer.write_record([row.factor.as_str(), format_score(row.mean).as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

fn generate_frequency_csv(
    rows: &[FrequencyRow],
    label: &str,
    output_dir: &str,
    file_name: &str,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(Path::new(output_dir).join(file_name))?;

    writer.write_record([label, "Cantidad_Respuestas"])?;
    for row in rows {
        writer.write_record([row.category.as_str(), row.count.to_string().as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

// Per-respondent composites, the input of the distribution plots
fn generate_respondent_indicators_csv(
    summary: &IndicatorSummary,
    schema: &SurveySchema,
    output_dir: &str,
) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(Path::new(output_dir).join("respondent_indicators.csv"))?;

    let frame = &summary.frame;
    let composite_columns: Vec<String> = schema.groups.iter().map(|g| g.output_column()).collect();

    let mut headers = vec![schema.category_column.clone()];
    headers.extend(composite_columns.iter().cloned());
    writer.write_record(&headers)?;

    let categories = frame.text(&schema.category_column);
    for row in 0..frame.row_count {
        let mut record = vec![categories.map(|c| c[row].clone()).unwrap_or_default()];
        for column in &composite_columns {
            let value = frame.scores(column).and_then(|values| values[row]);
            record.push(format_score(value));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn print_summary(summary: &IndicatorSummary) {
    println!("\n📊 SUMMARY");
    println!("==========\n");
    println!("👥 Respondents: {}", summary.respondents);

    if !summary.missing_columns.is_empty() {
        println!("⚠️  {} expected columns were missing and treated as empty", summary.missing_columns.len());
    }

    println!("\n📈 General indicators (scale 1-5):");
    for row in &summary.general {
        match row.mean {
            Some(mean) => println!("   - {}: {:.2}", row.indicator, mean),
            None => println!("   - {}: no data", row.indicator),
        }
    }

    for column in &summary.kpi_columns {
        if let Some(values) = summary.frame.scores(column) {
            if let Some(s) = stats::describe(values) {
                println!(
                    "   {} -> n={} mean={:.2} min={:.2} max={:.2}",
                    column, s.count, s.mean, s.min, s.max
                );
            }
        }
    }

    println!("\n🏆 Employability factors (most important first):");
    for (i, row) in summary.factors.iter().enumerate() {
        println!("   {}. {} ({})", i + 1, row.factor, format_score(row.mean));
    }

    println!("\n🎓 Responses per program (top 10):");
    for row in summary.category_frequency.iter().take(10) {
        println!("   {} - {}", row.category, row.count);
    }

    println!("\n📅 Responses per semester:");
    for row in &summary.semester_frequency {
        println!("   {} - {}", row.category, row.count);
    }

    println!(
        "\n🏫 Programs in the per-program table: {}",
        summary.by_category.len()
    );
    for row in &summary.by_category {
        println!("   {} ({} responses)", row.category, row.respondents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        let path = |name: &str| dir.join(name).to_str().unwrap().to_string();
        Config {
            raw_export: path("raw.csv"),
            cleaned_xlsx: path("clean.xlsx"),
            cleaned_csv: path("clean.csv"),
            report_file: path("report.log"),
            analysis_input: None,
            output_directory: Some(path("output")),
        }
    }

    #[test]
    fn test_report_sink_only_writes_while_attached() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.log");
        let mut sink = ReportSink::default();

        sink.attach(report.to_str().unwrap()).unwrap();
        sink.write_all(b"cleaning line\n").unwrap();
        sink.detach();
        sink.write_all(b"indicator warning\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&report).unwrap(), "cleaning line\n");
    }

    #[test]
    fn test_clean_fails_on_missing_export_without_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = run_clean(&config, &SurveySchema::default()).unwrap_err();

        assert!(format!("{:#}", err).contains("not found"));
        assert!(!Path::new(&config.cleaned_xlsx).exists());
        assert!(!Path::new(&config.cleaned_csv).exists());
    }

    #[test]
    fn test_clean_then_indicators_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let schema = SurveySchema::default();
        std::fs::write(
            &config.raw_export,
            format!(
                "{},Fundamentos de ciberseguridad.\nespoch,Experto\nESPOCH,Básico\nHarvard,Experto\n",
                schema::INSTITUTION_COLUMN
            ),
        )
        .unwrap();

        run_clean(&config, &schema).unwrap();
        let cleaned = tabular::read_table(&config.cleaned_csv).unwrap();
        assert_eq!(cleaned.len(), 2);

        run_indicators(&config, &schema).unwrap();
        let kpis = std::fs::read_to_string(dir.path().join("output").join("kpi_general.csv")).unwrap();
        assert!(kpis.contains("Competencias Técnicas,3.5000"));
    }
}
