// Writing the results: the Excel workbook with the three score tables and the JSON summary.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use serde_json::json;

use crate::scoring::*;

const ATTRIBUTE_SHEET: &str = "Attribute Scores";
const CATEGORY_SHEET: &str = "Category Scores";
const SUMMARY_SHEET: &str = "Summary";

/// Writes the attribute scores, the category scores and the totals, one worksheet each.
///
/// The parent directory of the output is created if needed.
pub fn write_workbook(path: &str, evaluation: &Evaluation) -> NsResult<()> {
    create_parent_dir(path)?;
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    write_attribute_sheet(workbook.add_worksheet(), &header, &evaluation.attribute_scores)
        .context(WritingExcelSnafu { path })?;
    write_category_sheet(workbook.add_worksheet(), &header, &evaluation.category_scores)
        .context(WritingExcelSnafu { path })?;
    write_summary_sheet(workbook.add_worksheet(), &header, &evaluation.summary)
        .context(WritingExcelSnafu { path })?;

    workbook.save(path).context(WritingExcelSnafu { path })?;
    debug!(
        "write_workbook: {}: {} attribute rows, {} category rows, {} nominees",
        path,
        evaluation.attribute_scores.len(),
        evaluation.category_scores.len(),
        evaluation.summary.len()
    );
    Ok(())
}

fn write_header(ws: &mut Worksheet, format: &Format, names: &[&str]) -> Result<(), XlsxError> {
    for (col, name) in names.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *name, format)?;
    }
    Ok(())
}

fn write_attribute_sheet(
    ws: &mut Worksheet,
    format: &Format,
    records: &[ScoredRecord],
) -> Result<(), XlsxError> {
    ws.set_name(ATTRIBUTE_SHEET)?;
    write_header(
        ws,
        format,
        &[
            "Nominee",
            "Attribute",
            "Category",
            "Score",
            "Max Score",
            "Justification",
            "Weighted Score",
        ],
    )?;
    for (idx, r) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        ws.write_string(row, 0, &r.nominee)?;
        ws.write_string(row, 1, &r.attribute)?;
        ws.write_string(row, 2, &r.category)?;
        ws.write_number(row, 3, r.score)?;
        ws.write_number(row, 4, r.max_score)?;
        ws.write_string(row, 5, &r.justification)?;
        ws.write_number(row, 6, r.weighted_score)?;
    }
    Ok(())
}

fn write_category_sheet(
    ws: &mut Worksheet,
    format: &Format,
    rollups: &[CategoryRollup],
) -> Result<(), XlsxError> {
    ws.set_name(CATEGORY_SHEET)?;
    write_header(
        ws,
        format,
        &["Nominee", "Category", "Raw Score", "Weight", "Weighted Score"],
    )?;
    for (idx, r) in rollups.iter().enumerate() {
        let row = (idx + 1) as u32;
        ws.write_string(row, 0, &r.nominee)?;
        ws.write_string(row, 1, &r.category)?;
        ws.write_number(row, 2, r.raw_score)?;
        ws.write_number(row, 3, r.weight)?;
        ws.write_number(row, 4, r.weighted_score)?;
    }
    Ok(())
}

fn write_summary_sheet(
    ws: &mut Worksheet,
    format: &Format,
    totals: &[TotalRollup],
) -> Result<(), XlsxError> {
    ws.set_name(SUMMARY_SHEET)?;
    write_header(ws, format, &["Nominee", "Total Weighted Score"])?;
    for (idx, t) in totals.iter().enumerate() {
        let row = (idx + 1) as u32;
        ws.write_string(row, 0, &t.nominee)?;
        ws.write_number(row, 1, t.total_weighted_score)?;
    }
    Ok(())
}

fn create_parent_dir(path: &str) -> NsResult<()> {
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).context(WritingFileSnafu {
                path: dir.display().to_string(),
            })
        }
        _ => Ok(()),
    }
}

// ********* JSON summary **********

#[derive(Serialize)]
struct OutputConfig {
    #[serde(rename = "runName")]
    run_name: String,
    model: String,
    #[serde(rename = "roundingMode")]
    rounding_mode: JSValue,
}

fn rules_js(rules: &ScoringRules) -> JSValue {
    match rules.rounding_mode {
        RoundingMode::HalfAwayFromZero => json!("halfAwayFromZero"),
        RoundingMode::HalfEven => json!("halfEven"),
    }
}

fn attribute_stats_js(stats: &[AttributeStats]) -> Vec<JSValue> {
    stats
        .iter()
        .map(|s| {
            json!({
                "attribute": s.attribute,
                "category": s.category,
                "reviews": s.num_reviews,
                "scores": s.num_items,
                "parseFailed": s.parse_failed
            })
        })
        .collect()
}

/// The JSON summary of a run.
///
/// No file paths are included, so that the summaries of two runs on different machines
/// can be compared.
pub fn build_summary_js(
    settings: &RunSettings,
    rules: &ScoringRules,
    evaluation: &Evaluation,
) -> JSValue {
    let c = OutputConfig {
        run_name: settings.run_name.clone(),
        model: settings.model.name.clone(),
        rounding_mode: rules_js(rules),
    };
    let attribute_scores: Vec<JSValue> = evaluation
        .attribute_scores
        .iter()
        .map(|r| {
            json!({
                "nominee": r.nominee,
                "attribute": r.attribute,
                "category": r.category,
                "score": r.score,
                "maxScore": r.max_score,
                "justification": r.justification,
                "weightedScore": r.weighted_score
            })
        })
        .collect();
    let category_scores: Vec<JSValue> = evaluation
        .category_scores
        .iter()
        .map(|r| {
            json!({
                "nominee": r.nominee,
                "category": r.category,
                "rawScore": r.raw_score,
                "weight": r.weight,
                "weightedScore": r.weighted_score
            })
        })
        .collect();
    let summary: Vec<JSValue> = evaluation
        .summary
        .iter()
        .map(|t| json!({"nominee": t.nominee, "totalWeightedScore": t.total_weighted_score}))
        .collect();
    let ranked: Vec<JSValue> = ranking(&evaluation.summary)
        .iter()
        .map(|r| json!({"rank": r.rank, "nominee": r.nominee}))
        .collect();
    json!({
        "config": c,
        "attributes": attribute_stats_js(&evaluation.attribute_stats),
        "attributeScores": attribute_scores,
        "categoryScores": category_scores,
        "summary": summary,
        "ranking": ranked
    })
}

/// Writes the JSON summary to a file, or to the standard output if the path is `stdout`.
pub fn write_json_output(path: &str, content: &str) -> NsResult<()> {
    if path == "stdout" {
        println!("{}", content);
        return Ok(());
    }
    create_parent_dir(path)?;
    fs::write(path, content).context(WritingFileSnafu { path })?;
    info!("Summary written to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, DataType, Reader, Xlsx};

    fn sample_evaluation() -> Evaluation {
        Evaluation {
            attribute_scores: vec![ScoredRecord {
                nominee: "Alice".to_string(),
                attribute: "Delegates".to_string(),
                category: "Business Performance".to_string(),
                score: 2.0,
                max_score: 2.0,
                justification: "Clear delegation.".to_string(),
                weighted_score: 0.67,
            }],
            category_scores: vec![CategoryRollup {
                nominee: "Alice".to_string(),
                category: "Business Performance".to_string(),
                raw_score: 2.0,
                weight: 0.333,
                weighted_score: 0.67,
            }],
            summary: vec![TotalRollup {
                nominee: "Alice".to_string(),
                total_weighted_score: 0.67,
            }],
            attribute_stats: vec![AttributeStats {
                attribute: "Delegates".to_string(),
                category: "Business Performance".to_string(),
                num_reviews: 1,
                num_items: 1,
                parse_failed: false,
            }],
        }
    }

    #[test]
    fn workbook_has_three_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested").join("out.xlsx");
        let path = p.display().to_string();
        write_workbook(&path, &sample_evaluation()).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            workbook.sheet_names().to_vec(),
            vec![
                ATTRIBUTE_SHEET.to_string(),
                CATEGORY_SHEET.to_string(),
                SUMMARY_SHEET.to_string()
            ]
        );

        let attrs = workbook.worksheet_range(ATTRIBUTE_SHEET).unwrap().unwrap();
        assert_eq!(attrs.get_size(), (2, 7));
        assert_eq!(
            attrs.get_value((0, 6)),
            Some(&DataType::String("Weighted Score".to_string()))
        );
        assert_eq!(
            attrs.get_value((1, 5)),
            Some(&DataType::String("Clear delegation.".to_string()))
        );
        assert_eq!(attrs.get_value((1, 6)), Some(&DataType::Float(0.67)));

        let cats = workbook.worksheet_range(CATEGORY_SHEET).unwrap().unwrap();
        assert_eq!(cats.get_value((1, 3)), Some(&DataType::Float(0.333)));

        let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap().unwrap();
        assert_eq!(
            summary.get_value((0, 1)),
            Some(&DataType::String("Total Weighted Score".to_string()))
        );
        assert_eq!(
            summary.get_value((1, 0)),
            Some(&DataType::String("Alice".to_string()))
        );
    }

    #[test]
    fn empty_evaluation_writes_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx").display().to_string();
        let ev = Evaluation {
            attribute_scores: vec![],
            category_scores: vec![],
            summary: vec![],
            attribute_stats: vec![],
        };
        write_workbook(&path, &ev).unwrap();
        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap().unwrap();
        assert_eq!(summary.get_size(), (1, 2));
    }

    #[test]
    fn summary_json() {
        let settings = RunSettings {
            run_name: "2024".to_string(),
            input_path: "/somewhere/reviews.xlsx".to_string(),
            worksheet_name: None,
            columns: InputSource::default().columns(),
            output_path: "/somewhere/out.xlsx".to_string(),
            json_output_path: None,
            reference_path: None,
            responses_path: None,
            model: ModelConfig::default().resolve(),
        };
        let js = build_summary_js(&settings, &ScoringRules::DEFAULT_RULES, &sample_evaluation());
        assert_eq!(
            js["config"],
            json!({"runName": "2024", "model": "gpt-4o", "roundingMode": "halfAwayFromZero"})
        );
        assert_eq!(js["attributes"][0]["scores"], json!(1));
        assert_eq!(js["attributeScores"][0]["maxScore"], json!(2.0));
        assert_eq!(js["categoryScores"][0]["weight"], json!(0.333));
        assert_eq!(
            js["summary"],
            json!([{"nominee": "Alice", "totalWeightedScore": 0.67}])
        );
        assert_eq!(js["ranking"], json!([{"rank": 1, "nominee": "Alice"}]));
        assert!(!js.to_string().contains("/somewhere"));
    }

    #[test]
    fn json_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("summary.json").display().to_string();
        write_json_output(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }
}
