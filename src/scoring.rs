use log::{debug, info, warn};

use nominee_scoring::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::scoring::config_reader::*;
use crate::scoring::io_report::{build_summary_js, write_json_output, write_workbook};
use crate::scoring::io_xlsx::read_reviews;
use crate::scoring::openai::{ChatCompletionClient, ReplayScorer};

pub mod config_reader;
mod io_common;
mod io_report;
mod io_xlsx;
mod openai;

pub use crate::scoring::io_common::error_chain;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NsError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot find the worksheet {name:?} in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Cannot find the column {column_name:?} in the header of {path}"))]
    ExcelMissingColumn { column_name: String, path: String },
    #[snafu(display("Unexpected cell at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error writing the Excel file {path}"))]
    WritingExcel {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The environment variable {var} is not set"))]
    MissingApiKey { var: String },
    #[snafu(display("Cannot build the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("The request to the model failed for attribute {attribute:?}"))]
    ModelRequest {
        source: reqwest::Error,
        attribute: String,
    },
    #[snafu(display("The model service answered with status {status} for attribute {attribute:?}: {message}"))]
    ModelStatus {
        status: u16,
        attribute: String,
        message: String,
    },
    #[snafu(display("The model returned no content for attribute {attribute:?}"))]
    EmptyCompletion { attribute: String },
    #[snafu(display("The evaluation failed"))]
    Scoring { source: ScoringErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type NsResult<T> = Result<T, NsError>;

/// The settings of a run, after merging the command line and the configuration file.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub run_name: String,
    pub input_path: String,
    pub worksheet_name: Option<String>,
    pub columns: ReviewColumns,
    pub output_path: String,
    pub json_output_path: Option<String>,
    pub reference_path: Option<String>,
    pub responses_path: Option<String>,
    pub model: ModelSettings,
}

const DEFAULT_INPUT_PATH: &str = "./data/reviews_long_dummy.xlsx";
const DEFAULT_OUTPUT_PATH: &str = "./outputs/processed_output_dummy.xlsx";

fn resolve_settings(args: &Args, config: &ScoringConfig, config_dir: Option<&Path>) -> RunSettings {
    let input_source = config.input_source.clone().unwrap_or_default();
    let output_settings = config.output_settings.clone().unwrap_or_default();
    let model_config = config.model.clone().unwrap_or_default();

    // The command line paths are taken as is, the paths of the config are relative to it.
    let from_config = |p: &Option<String>| p.as_ref().map(|s| resolve_path(config_dir, s));

    let input_path = args
        .input
        .clone()
        .or_else(|| from_config(&input_source.file_path))
        .unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string());
    let output_path = args
        .out
        .clone()
        .or_else(|| from_config(&output_settings.output_path))
        .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());
    let json_output_path = match args.json_out.clone() {
        Some(p) => Some(p),
        None => match output_settings.json_output_path.as_deref() {
            Some("stdout") => Some("stdout".to_string()),
            _ => from_config(&output_settings.json_output_path),
        },
    };
    let run_name = output_settings
        .run_name
        .clone()
        .unwrap_or_else(|| io_common::simplify_file_name(&input_path));

    let mut model = model_config.resolve();
    if let Some(m) = args.model.clone() {
        model.name = m;
    }

    RunSettings {
        run_name,
        input_path,
        worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or(input_source.excel_worksheet_name.clone()),
        columns: input_source.columns(),
        output_path,
        json_output_path,
        reference_path: args.reference.clone(),
        responses_path: args.responses.clone(),
        model,
    }
}

pub fn run_scoring(args: &Args) -> NsResult<()> {
    let (config, config_dir) = match args.config.clone() {
        Some(p) => {
            let config = read_config(&p)?;
            let dir = Path::new(p.as_str()).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (ScoringConfig::default(), None),
    };
    debug!("config: {:?}", config);

    let settings = resolve_settings(args, &config, config_dir.as_deref());
    info!("settings: {:?}", settings);

    let registry = build_registry(&config.criteria)?;
    let rules = validate_rules(&config.rules)?;
    info!(
        "{} categories and {} attributes registered",
        registry.categories().len(),
        registry.criteria().len()
    );

    let reviews = read_reviews(
        &settings.input_path,
        settings.worksheet_name.as_deref(),
        &settings.columns,
    )?;
    info!("Read {} reviews from {}", reviews.len(), settings.input_path);

    let evaluation = match settings.responses_path.clone() {
        Some(p) => {
            info!("Using the recorded responses from {}", p);
            let mut scorer = ReplayScorer::from_file(&p)?;
            run_evaluation(&reviews, &registry, &rules, &mut scorer).context(ScoringSnafu {})?
        }
        None => {
            let mut scorer = ChatCompletionClient::from_settings(&settings.model)?;
            run_evaluation(&reviews, &registry, &rules, &mut scorer).context(ScoringSnafu {})?
        }
    };

    for s in evaluation.attribute_stats.iter() {
        if s.parse_failed {
            warn!(
                "No score for attribute {:?}: the model answer could not be parsed",
                s.attribute
            );
        } else if s.num_items != s.num_reviews {
            warn!(
                "Attribute {:?}: {} reviews but {} scores returned",
                s.attribute, s.num_reviews, s.num_items
            );
        }
    }

    write_workbook(&settings.output_path, &evaluation)?;
    info!("Scores written to {}", settings.output_path);

    println!("{}", format_ranking(&evaluation));

    let summary_js = build_summary_js(&settings, &rules, &evaluation);
    let pretty_js_summary = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    if let Some(p) = settings.json_output_path.clone() {
        write_json_output(&p, &pretty_js_summary)?;
    }

    // The reference summary, if provided for comparison
    if let Some(p) = settings.reference_path.clone() {
        check_reference(&p, &pretty_js_summary)?;
    }

    Ok(())
}

fn format_ranking(evaluation: &Evaluation) -> String {
    let mut lines: Vec<String> = vec!["Rank  Score   Nominee".to_string()];
    for r in ranking(&evaluation.summary).iter() {
        lines.push(format!(
            "{:>4}  {:>6.2}  {}",
            r.rank, r.total_weighted_score, r.nominee
        ));
    }
    lines.join("\n")
}

pub fn read_summary(path: &str) -> NsResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn check_reference(reference_path: &str, pretty_js_summary: &str) -> NsResult<()> {
    let summary_ref = read_summary(reference_path)?;
    debug!("reference summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_summary {
        warn!("Found differences with the reference summary {}", reference_path);
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_summary, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    info!("The summary matches the reference {}", reference_path);
    Ok(())
}
