//! Extraction of the scores from the untrusted text returned by the model.
//!
//! The model is asked to answer with a JSON array, but nothing forces it to do so:
//! the array may be wrapped in prose or in a markdown block. The extraction is best effort
//! and never fails. A response that cannot be understood yields no item.

use log::{debug, warn};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::config::RawScoreItem;

const NOMINEE_KEY: &str = "Nominee";
const SCORE_KEY: &str = "Score";
const JUSTIFICATION_KEY: &str = "Justification";

/// The items found in one model response.
#[derive(PartialEq, Debug, Clone)]
pub struct Extraction {
    pub items: Vec<RawScoreItem>,
    pub parse_failed: bool,
}

/// Extracts the score items from a model response, in the order they appear.
///
/// The text between the first `[` and the last `]` (inclusive) is decoded as a JSON array.
/// `attribute` is only used for the diagnostics.
pub fn extract_score_items(text: &str, attribute: &str) -> Extraction {
    let elements = match extract_json_array(text) {
        Some(elements) => elements,
        None => {
            warn!(
                "extract_score_items: failed to parse the model output for {:?}",
                attribute
            );
            debug!("extract_score_items: unparsed output: {:?}", text);
            return Extraction {
                items: Vec::new(),
                parse_failed: true,
            };
        }
    };

    let mut items: Vec<RawScoreItem> = Vec::new();
    for (idx, elt) in elements.iter().enumerate() {
        match elt {
            JSValue::Object(obj) => items.push(read_item(obj)),
            _ => {
                warn!(
                    "extract_score_items: {:?}: skipping element {} which is not an object: {:?}",
                    attribute, idx, elt
                );
            }
        }
    }
    debug!(
        "extract_score_items: {:?}: {} items extracted",
        attribute,
        items.len()
    );
    Extraction {
        items,
        parse_failed: false,
    }
}

fn extract_json_array(text: &str) -> Option<Vec<JSValue>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Vec<JSValue>>(&text[start..=end]).ok()
}

fn read_item(obj: &JSMap<String, JSValue>) -> RawScoreItem {
    let nominee = match obj.get(NOMINEE_KEY) {
        Some(JSValue::String(s)) => s.trim().to_string(),
        Some(JSValue::Number(n)) => n.to_string(),
        _ => "".to_string(),
    };
    RawScoreItem {
        nominee,
        score: read_score(obj.get(SCORE_KEY)),
        justification: match obj.get(JUSTIFICATION_KEY) {
            Some(JSValue::String(s)) => s.trim().to_string(),
            _ => "".to_string(),
        },
    }
}

// Missing or non-numeric scores count as zero.
fn read_score(x: Option<&JSValue>) -> f64 {
    let score = match x {
        Some(JSValue::Number(n)) => n.as_f64(),
        Some(JSValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(f) if f.is_finite() => f,
        _ => 0.0,
    }
}
