use crate::scoring::*;

use nominee_scoring::builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSource {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "nomineeColumn")]
    pub nominee_column: Option<String>,
    #[serde(rename = "attributeColumn")]
    pub attribute_column: Option<String>,
    #[serde(rename = "summaryColumn")]
    pub summary_column: Option<String>,
}

/// The names of the columns to read in the header of the input.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReviewColumns {
    pub nominee: String,
    pub attribute: String,
    pub summary: String,
}

impl InputSource {
    pub fn columns(&self) -> ReviewColumns {
        ReviewColumns {
            nominee: self
                .nominee_column
                .clone()
                .unwrap_or_else(|| "Nominee".to_string()),
            attribute: self
                .attribute_column
                .clone()
                .unwrap_or_else(|| "Attribute".to_string()),
            summary: self
                .summary_column
                .clone()
                .unwrap_or_else(|| "Summary".to_string()),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    /// A file path or `stdout`
    #[serde(rename = "jsonOutputPath")]
    pub json_output_path: Option<String>,
    #[serde(rename = "runName")]
    pub run_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaAttribute {
    pub name: String,
    #[serde(rename = "maxScore")]
    pub max_score: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaCategory {
    pub category: String,
    pub weight: f64,
    pub attributes: Vec<CriteriaAttribute>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

/// The settings of the chat completion service, with the defaults filled in.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelSettings {
    pub name: String,
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl ModelConfig {
    pub fn resolve(&self) -> ModelSettings {
        ModelSettings {
            name: self.name.clone().unwrap_or_else(|| "gpt-4o".to_string()),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key_env: self
                .api_key_env
                .clone()
                .unwrap_or_else(|| "OPENAI_API_KEY".to_string()),
            temperature: self.temperature.unwrap_or(0.2),
            max_tokens: self.max_tokens.unwrap_or(1500),
            timeout_seconds: self.timeout_seconds.unwrap_or(120),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "roundingMode")]
    pub rounding_mode: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(rename = "inputSource")]
    pub input_source: Option<InputSource>,
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    pub criteria: Option<Vec<CriteriaCategory>>,
    pub model: Option<ModelConfig>,
    pub rules: Option<RulesConfig>,
}

pub fn read_config(path: &str) -> NsResult<ScoringConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ScoringConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Builds the registry from the criteria of the configuration, or the builtin criteria
/// when none are provided.
pub fn build_registry(criteria: &Option<Vec<CriteriaCategory>>) -> NsResult<Registry> {
    let categories = match criteria {
        Some(c) => c,
        None => return Ok(Registry::builtin()),
    };
    let mut b = Builder::new();
    for c in categories.iter() {
        b.add_category(&c.category, c.weight)
            .context(ScoringSnafu {})?;
        for a in c.attributes.iter() {
            b.add_attribute(&a.name, a.max_score)
                .context(ScoringSnafu {})?;
        }
    }
    b.build().context(ScoringSnafu {})
}

pub fn validate_rules(rules: &Option<RulesConfig>) -> NsResult<ScoringRules> {
    let mut res = ScoringRules::DEFAULT_RULES;
    if let Some(mode) = rules.as_ref().and_then(|r| r.rounding_mode.clone()) {
        res.rounding_mode = match mode.as_str() {
            "halfAwayFromZero" => RoundingMode::HalfAwayFromZero,
            "halfEven" => RoundingMode::HalfEven,
            x => {
                whatever!("Unknown rounding mode {:?}", x)
            }
        };
    }
    Ok(res)
}

/// Paths in the configuration file are relative to the directory of this file.
pub fn resolve_path(root: Option<&Path>, path: &str) -> String {
    match root {
        Some(r) if Path::new(path).is_relative() => {
            let p: PathBuf = r.join(path);
            p.display().to_string()
        }
        _ => path.to_string(),
    }
}
