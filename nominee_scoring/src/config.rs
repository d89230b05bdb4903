// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// One review of a nominee for a given attribute, as read from the input.
#[derive(PartialEq, Debug, Clone)]
pub struct ReviewRecord {
    pub nominee: String,
    pub attribute: String,
    pub summary: String,
}

impl ReviewRecord {
    pub fn new(nominee: &str, attribute: &str, summary: &str) -> ReviewRecord {
        ReviewRecord {
            nominee: nominee.to_string(),
            attribute: attribute.to_string(),
            summary: summary.to_string(),
        }
    }
}

/// An item returned by the model for one nominee.
///
/// This is untrusted data: the missing fields have already been replaced by
/// their defaults (empty strings, zero score) by the extractor.
#[derive(PartialEq, Debug, Clone)]
pub struct RawScoreItem {
    pub nominee: String,
    pub score: f64,
    pub justification: String,
}

// ******** Output data structures *********

/// The canonical scoring record for one (nominee, attribute) pair.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoredRecord {
    pub nominee: String,
    pub attribute: String,
    pub category: String,
    pub score: f64,
    pub max_score: f64,
    pub justification: String,
    pub weighted_score: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CategoryRollup {
    pub nominee: String,
    pub category: String,
    pub raw_score: f64,
    pub weight: f64,
    pub weighted_score: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct TotalRollup {
    pub nominee: String,
    pub total_weighted_score: f64,
}

/// A position in the final ranking.
#[derive(PartialEq, Debug, Clone)]
pub struct RankedNominee {
    pub rank: u32,
    pub nominee: String,
    pub total_weighted_score: f64,
}

/// Statistics for the processing of one attribute group
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AttributeStats {
    pub attribute: String,
    pub category: String,
    pub num_reviews: usize,
    pub num_items: usize,
    /// The model response could not be understood. All the nominees of this
    /// group are left without a score for this attribute.
    pub parse_failed: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Evaluation {
    pub attribute_scores: Vec<ScoredRecord>,
    pub category_scores: Vec<CategoryRollup>,
    pub summary: Vec<TotalRollup>,
    pub attribute_stats: Vec<AttributeStats>,
}

/// Errors that prevent the evaluation from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringErrors {
    /// The criteria could not be assembled into a registry.
    InvalidCriteria(String),
    /// A category was found during the rollup that is not in the registry.
    UnknownCategory(String),
    /// The external scoring function failed for this attribute.
    ScorerFailed { attribute: String, message: String },
}

impl Error for ScoringErrors {}

impl Display for ScoringErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringErrors::InvalidCriteria(msg) => write!(f, "invalid criteria: {}", msg),
            ScoringErrors::UnknownCategory(name) => {
                write!(f, "category {:?} is not registered", name)
            }
            ScoringErrors::ScorerFailed { attribute, message } => {
                write!(f, "scoring failed for attribute {:?}: {}", attribute, message)
            }
        }
    }
}

// ********* Configuration **********

/// How a value is rounded to 2 decimal places.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RoundingMode {
    /// 0.125 -> 0.13, -0.125 -> -0.13
    HalfAwayFromZero,
    /// 0.125 -> 0.12, 0.375 -> 0.38
    HalfEven,
}

impl RoundingMode {
    pub fn round2(&self, x: f64) -> f64 {
        let scaled = x * 100.0;
        let r = match self {
            RoundingMode::HalfAwayFromZero => scaled.round(),
            RoundingMode::HalfEven => scaled.round_ties_even(),
        };
        r / 100.0
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoringRules {
    pub rounding_mode: RoundingMode,
}

impl ScoringRules {
    pub const DEFAULT_RULES: ScoringRules = ScoringRules {
        rounding_mode: RoundingMode::HalfAwayFromZero,
    };
}

#[derive(PartialEq, Debug, Clone)]
pub struct Criterion {
    pub category: String,
    pub attribute: String,
    pub max_score: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Category {
    pub name: String,
    pub weight: f64,
}

/// The fixed hierarchy of categories and attributes.
///
/// A registry is immutable once built. Use the [`crate::builder::Builder`] to create one,
/// or [`Registry::builtin`] for the standard criteria.
#[derive(PartialEq, Debug, Clone)]
pub struct Registry {
    pub(crate) categories: Vec<Category>,
    pub(crate) criteria: Vec<Criterion>,
    pub(crate) by_attribute: HashMap<String, usize>,
    pub(crate) by_category: HashMap<String, usize>,
}

impl Registry {
    /// Looks up an attribute. Returns None for an unknown attribute.
    pub fn attribute(&self, name: &str) -> Option<&Criterion> {
        self.by_attribute.get(name).map(|idx| &self.criteria[*idx])
    }

    pub fn category_weight(&self, name: &str) -> Option<f64> {
        self.by_category
            .get(name)
            .map(|idx| self.categories[*idx].weight)
    }

    /// The categories, in declaration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// All the criteria, in declaration order.
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// The default evaluation criteria.
    pub fn builtin() -> Registry {
        match builtin_registry() {
            Ok(r) => r,
            Err(e) => panic!("the builtin criteria are invalid: {}", e),
        }
    }
}

fn builtin_registry() -> Result<Registry, ScoringErrors> {
    let mut b = crate::builder::Builder::new();
    for (category, weight, attributes) in BUILTIN_CRITERIA.iter() {
        b.add_category(category, *weight)?;
        for (attribute, max_score) in attributes.iter() {
            b.add_attribute(attribute, *max_score)?;
        }
    }
    b.build()
}

type BuiltinCategory = (&'static str, f64, &'static [(&'static str, f64)]);

const BUILTIN_CRITERIA: &[BuiltinCategory] = &[
    (
        "Business Performance",
        0.333,
        &[
            ("Delegates", 2.5),
            ("Inspires and Motivates", 2.5),
            ("Contributes to Lean", 2.5),
            ("Personal Impact", 2.5),
        ],
    ),
    (
        "People Development",
        0.333,
        &[
            ("Regularly Engages", 2.0),
            ("Coaches & Mentors", 2.0),
            ("Gives Constructive Feedback", 2.0),
            ("Provides Opportunities in Closing Competency gaps", 2.0),
            ("Encourages Staff Mobility", 2.0),
        ],
    ),
    (
        "Innovation in People Development",
        0.333,
        &[
            ("Goes ‘out of norm’ in developing individuals", 5.0),
            ("Made an External Impact", 5.0),
        ],
    ),
];
