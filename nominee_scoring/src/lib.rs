mod config;
use log::{debug, info, warn};

use std::collections::HashMap;

pub mod builder;
pub mod extract;
pub mod manual;

pub use crate::config::*;
pub use crate::extract::{extract_score_items, Extraction};

// ********* External scoring function ***********

/// The external function that scores one group of reviews.
///
/// It receives the attribute being scored and the prompt text, and returns the
/// raw text of the model answer. Failures are fatal for the whole evaluation.
pub trait Scorer {
    fn complete(&mut self, attribute: &str, prompt: &str) -> Result<String, ScoringErrors>;
}

impl<F> Scorer for F
where
    F: FnMut(&str, &str) -> Result<String, ScoringErrors>,
{
    fn complete(&mut self, attribute: &str, prompt: &str) -> Result<String, ScoringErrors> {
        self(attribute, prompt)
    }
}

/// All the reviews for one attribute. They are sent in a single call.
#[derive(PartialEq, Debug, Clone)]
pub struct AttributeGroup {
    pub attribute: String,
    pub category: String,
    pub max_score: f64,
    /// (nominee, summary), in input order
    pub reviews: Vec<(String, String)>,
}

impl AttributeGroup {
    pub fn prompt(&self) -> String {
        let snippet = self
            .reviews
            .iter()
            .map(|(nominee, summary)| format!("Nominee: {}\nReview: {}", nominee, summary))
            .collect::<Vec<String>>()
            .join("\n\n");
        format!(
            r#"
You are an experienced HR evaluator. Compare nominees for the attribute "{attr}".
- Assign scores between 1 and {max_score}.
- Provide comparative justifications using phrases like "Compared to..." or "Less impactful than...".
- Respond in JSON format:
[
  {{ "Nominee": "Name", "Score": 2.0, "Justification": "..." }}
]
Reviews:
{snippet}
"#,
            attr = self.attribute,
            max_score = self.max_score,
            snippet = snippet
        )
    }
}

/// Groups the reviews by attribute.
///
/// The groups come in the order in which each attribute is first seen in the input.
/// Reviews with an attribute that is not registered are dropped.
pub fn group_reviews(reviews: &[ReviewRecord], registry: &Registry) -> Vec<AttributeGroup> {
    let mut groups: Vec<AttributeGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut num_dropped: usize = 0;
    for r in reviews.iter() {
        let criterion = match registry.attribute(&r.attribute) {
            Some(c) => c,
            None => {
                debug!(
                    "group_reviews: dropping review of {:?}: unknown attribute {:?}",
                    r.nominee, r.attribute
                );
                num_dropped += 1;
                continue;
            }
        };
        let idx = *group_index.entry(r.attribute.clone()).or_insert_with(|| {
            groups.push(AttributeGroup {
                attribute: criterion.attribute.clone(),
                category: criterion.category.clone(),
                max_score: criterion.max_score,
                reviews: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx]
            .reviews
            .push((r.nominee.clone(), r.summary.clone()));
    }
    if num_dropped > 0 {
        info!(
            "group_reviews: dropped {} reviews with an unknown attribute",
            num_dropped
        );
    }
    groups
}

// ********* Normalization **********

/// Turns one item returned by the model into a scoring record.
///
/// The score is not clamped to the range of the attribute.
pub fn normalize_item(
    item: &RawScoreItem,
    criterion: &Criterion,
    weight: f64,
    rules: &ScoringRules,
) -> ScoredRecord {
    if item.score < 0.0 || item.score > criterion.max_score {
        warn!(
            "normalize_item: {:?}: score {} of {:?} is outside of the range [0, {}]",
            criterion.attribute, item.score, item.nominee, criterion.max_score
        );
    }
    ScoredRecord {
        nominee: item.nominee.clone(),
        attribute: criterion.attribute.clone(),
        category: criterion.category.clone(),
        score: item.score,
        max_score: criterion.max_score,
        justification: item.justification.clone(),
        weighted_score: rules.rounding_mode.round2(item.score * weight),
    }
}

// ********* Aggregation **********

/// Sums the scores by (nominee, category).
///
/// One row per pair that has at least one record, in order of first appearance.
pub fn rollup_categories(
    records: &[ScoredRecord],
    registry: &Registry,
    rules: &ScoringRules,
) -> Result<Vec<CategoryRollup>, ScoringErrors> {
    let mut keys: Vec<(String, String)> = Vec::new();
    let mut sums: HashMap<(String, String), f64> = HashMap::new();
    for r in records.iter() {
        let key = (r.nominee.clone(), r.category.clone());
        match sums.get_mut(&key) {
            Some(s) => *s += r.score,
            None => {
                sums.insert(key.clone(), r.score);
                keys.push(key);
            }
        }
    }

    let mut res: Vec<CategoryRollup> = Vec::new();
    for key in keys.into_iter() {
        let raw_score = sums.get(&key).cloned().unwrap_or(0.0);
        let (nominee, category) = key;
        let weight = registry
            .category_weight(&category)
            .ok_or_else(|| ScoringErrors::UnknownCategory(category.clone()))?;
        res.push(CategoryRollup {
            nominee,
            category,
            raw_score,
            weight,
            weighted_score: rules.rounding_mode.round2(raw_score * weight),
        });
    }
    Ok(res)
}

/// Sums the weighted category scores by nominee, in order of first appearance.
pub fn rollup_totals(categories: &[CategoryRollup], rules: &ScoringRules) -> Vec<TotalRollup> {
    let mut res: Vec<TotalRollup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for c in categories.iter() {
        match index.get(&c.nominee) {
            Some(idx) => res[*idx].total_weighted_score += c.weighted_score,
            None => {
                index.insert(c.nominee.clone(), res.len());
                res.push(TotalRollup {
                    nominee: c.nominee.clone(),
                    total_weighted_score: c.weighted_score,
                });
            }
        }
    }
    // The sum of values with 2 decimals has 2 decimals.
    for t in res.iter_mut() {
        t.total_weighted_score = rules.rounding_mode.round2(t.total_weighted_score);
    }
    res
}

/// Runs both rollup stages.
pub fn aggregate(
    records: &[ScoredRecord],
    registry: &Registry,
    rules: &ScoringRules,
) -> Result<(Vec<CategoryRollup>, Vec<TotalRollup>), ScoringErrors> {
    let categories = rollup_categories(records, registry, rules)?;
    let totals = rollup_totals(&categories, rules);
    debug!(
        "aggregate: {} records -> {} category rows -> {} nominees",
        records.len(),
        categories.len(),
        totals.len()
    );
    Ok((categories, totals))
}

/// Orders the nominees by decreasing total score.
///
/// Ties keep their relative order and share the same rank.
pub fn ranking(totals: &[TotalRollup]) -> Vec<RankedNominee> {
    let mut sorted: Vec<&TotalRollup> = totals.iter().collect();
    sorted.sort_by(|a, b| b.total_weighted_score.total_cmp(&a.total_weighted_score));
    let mut res: Vec<RankedNominee> = Vec::new();
    for (idx, t) in sorted.iter().enumerate() {
        let rank = match res.last() {
            Some(prev) if prev.total_weighted_score == t.total_weighted_score => prev.rank,
            _ => (idx + 1) as u32,
        };
        res.push(RankedNominee {
            rank,
            nominee: t.nominee.clone(),
            total_weighted_score: t.total_weighted_score,
        });
    }
    res
}

// ********* Evaluation **********

/// Scores all the reviews and computes the rollups.
///
/// Arguments:
/// * `reviews` the reviews to score. The ones with an unknown attribute are ignored.
/// * `registry` the evaluation criteria
/// * `rules` the arithmetic rules
/// * `scorer` the external scoring function. It is called exactly once per attribute,
/// in the order in which the attributes first appear in `reviews`.
pub fn run_evaluation<S: Scorer>(
    reviews: &[ReviewRecord],
    registry: &Registry,
    rules: &ScoringRules,
    scorer: &mut S,
) -> Result<Evaluation, ScoringErrors> {
    info!(
        "Processing {:?} reviews, {:?} attributes registered, rules: {:?}",
        reviews.len(),
        registry.criteria().len(),
        rules
    );

    let groups = group_reviews(reviews, registry);
    info!("Processing {:?} attribute groups", groups.len());

    let mut records: Vec<ScoredRecord> = Vec::new();
    let mut attribute_stats: Vec<AttributeStats> = Vec::new();
    for group in groups.iter() {
        let criterion = registry
            .attribute(&group.attribute)
            .ok_or_else(|| ScoringErrors::UnknownCategory(group.category.clone()))?;
        let weight = registry
            .category_weight(&group.category)
            .ok_or_else(|| ScoringErrors::UnknownCategory(group.category.clone()))?;

        info!(
            "Scoring attribute {:?} ({} reviews)",
            group.attribute,
            group.reviews.len()
        );
        let prompt = group.prompt();
        debug!("run_evaluation: prompt: {}", prompt);
        let text = scorer.complete(&group.attribute, &prompt)?;
        debug!("run_evaluation: response: {}", text);

        let extraction = extract_score_items(text.trim(), &group.attribute);
        for item in extraction.items.iter() {
            records.push(normalize_item(item, criterion, weight, rules));
        }
        attribute_stats.push(AttributeStats {
            attribute: group.attribute.clone(),
            category: group.category.clone(),
            num_reviews: group.reviews.len(),
            num_items: extraction.items.len(),
            parse_failed: extraction.parse_failed,
        });
    }

    let (category_scores, summary) = aggregate(&records, registry, rules)?;
    for r in ranking(&summary).iter() {
        info!(
            "Rank {}: {} ({})",
            r.rank, r.nominee, r.total_weighted_score
        );
    }
    Ok(Evaluation {
        attribute_scores: records,
        category_scores,
        summary,
        attribute_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::builder::Builder;
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn test_registry() -> Registry {
        Builder::new()
            .category("Business Performance", 0.333)
            .and_then(|b| b.attribute("Delegates", 2.5))
            .and_then(|b| b.attribute("Personal Impact", 2.5))
            .and_then(|b| b.category("People Development", 0.5))
            .and_then(|b| b.attribute("Coaches & Mentors", 2.0))
            .and_then(|b| b.build())
            .unwrap()
    }

    fn record(nominee: &str, attribute: &str, category: &str, score: f64, weight: f64) -> ScoredRecord {
        ScoredRecord {
            nominee: nominee.to_string(),
            attribute: attribute.to_string(),
            category: category.to_string(),
            score,
            max_score: 2.5,
            justification: "".to_string(),
            weighted_score: RoundingMode::HalfAwayFromZero.round2(score * weight),
        }
    }

    #[test]
    fn rounding_modes() {
        let r = RoundingMode::HalfAwayFromZero;
        assert_eq!(r.round2(0.666), 0.67);
        assert_eq!(r.round2(0.333), 0.33);
        assert_eq!(r.round2(0.125), 0.13);
        assert_eq!(r.round2(-0.125), -0.13);
        let r = RoundingMode::HalfEven;
        assert_eq!(r.round2(0.125), 0.12);
        assert_eq!(r.round2(0.375), 0.38);
        assert_eq!(r.round2(0.666), 0.67);
    }

    #[test]
    fn normalize_weighted_score() {
        let reg = test_registry();
        let c = reg.attribute("Delegates").unwrap();
        let item = RawScoreItem {
            nominee: "A".to_string(),
            score: 2.0,
            justification: "x".to_string(),
        };
        let r = normalize_item(&item, c, 0.333, &ScoringRules::DEFAULT_RULES);
        assert_eq!(r.nominee, "A");
        assert_eq!(r.attribute, "Delegates");
        assert_eq!(r.category, "Business Performance");
        assert_eq!(r.score, 2.0);
        assert_eq!(r.max_score, 2.5);
        assert_eq!(r.justification, "x");
        assert_eq!(r.weighted_score, 0.67);
    }

    #[test]
    fn normalize_does_not_clamp() {
        let reg = test_registry();
        let c = reg.attribute("Delegates").unwrap();
        let item = RawScoreItem {
            nominee: "".to_string(),
            score: 4.0,
            justification: "".to_string(),
        };
        let r = normalize_item(&item, c, 0.5, &ScoringRules::DEFAULT_RULES);
        assert_eq!(r.score, 4.0);
        assert_eq!(r.weighted_score, 2.0);
    }

    #[test]
    fn category_rollup_is_sparse_and_ordered() {
        let reg = test_registry();
        let records = vec![
            record("B", "Delegates", "Business Performance", 1.0, 0.333),
            record("A", "Delegates", "Business Performance", 2.0, 0.333),
            record("B", "Coaches & Mentors", "People Development", 1.5, 0.5),
            record("B", "Personal Impact", "Business Performance", 2.0, 0.333),
        ];
        let cats = rollup_categories(&records, &reg, &ScoringRules::DEFAULT_RULES).unwrap();
        let keys: Vec<(&str, &str, f64)> = cats
            .iter()
            .map(|c| (c.nominee.as_str(), c.category.as_str(), c.raw_score))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("B", "Business Performance", 3.0),
                ("A", "Business Performance", 2.0),
                ("B", "People Development", 1.5),
            ]
        );
        assert_eq!(cats[0].weight, 0.333);
        assert_eq!(cats[0].weighted_score, 1.0);
        assert_eq!(cats[1].weighted_score, 0.67);
        assert_eq!(cats[2].weight, 0.5);
        assert_eq!(cats[2].weighted_score, 0.75);
    }

    #[test]
    fn totals_sum_the_categories() {
        let reg = test_registry();
        let records = vec![
            record("A", "Delegates", "Business Performance", 2.0, 0.333),
            record("A", "Personal Impact", "Business Performance", 2.0, 0.333),
            record("A", "Coaches & Mentors", "People Development", 2.0, 0.5),
            record("B", "Coaches & Mentors", "People Development", 1.0, 0.5),
        ];
        let (cats, totals) = aggregate(&records, &reg, &ScoringRules::DEFAULT_RULES).unwrap();
        assert_eq!(cats.len(), 3);
        assert_eq!(
            totals,
            vec![
                TotalRollup {
                    nominee: "A".to_string(),
                    total_weighted_score: 2.33,
                },
                TotalRollup {
                    nominee: "B".to_string(),
                    total_weighted_score: 0.5,
                },
            ]
        );
        for t in totals.iter() {
            let s: f64 = cats
                .iter()
                .filter(|c| c.nominee == t.nominee)
                .map(|c| c.weighted_score)
                .sum();
            assert!((s - t.total_weighted_score).abs() < 1e-9);
        }
    }

    #[test]
    fn unknown_category_is_an_error() {
        let reg = test_registry();
        let records = vec![record("A", "Delegates", "Nope", 2.0, 0.333)];
        let res = rollup_categories(&records, &reg, &ScoringRules::DEFAULT_RULES);
        assert_eq!(res, Err(ScoringErrors::UnknownCategory("Nope".to_string())));
    }

    #[test]
    fn aggregate_is_idempotent() {
        let reg = test_registry();
        let records = vec![
            record("A", "Delegates", "Business Performance", 2.0, 0.333),
            record("B", "Coaches & Mentors", "People Development", 1.0, 0.5),
        ];
        let r1 = aggregate(&records, &reg, &ScoringRules::DEFAULT_RULES).unwrap();
        let r2 = aggregate(&records, &reg, &ScoringRules::DEFAULT_RULES).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn empty_input() {
        let reg = test_registry();
        let (cats, totals) = aggregate(&[], &reg, &ScoringRules::DEFAULT_RULES).unwrap();
        assert!(cats.is_empty());
        assert!(totals.is_empty());
    }

    #[test]
    fn ranking_with_ties() {
        let totals = vec![
            TotalRollup {
                nominee: "A".to_string(),
                total_weighted_score: 0.5,
            },
            TotalRollup {
                nominee: "B".to_string(),
                total_weighted_score: 1.5,
            },
            TotalRollup {
                nominee: "C".to_string(),
                total_weighted_score: 0.5,
            },
        ];
        let ranked = ranking(&totals);
        let r: Vec<(u32, &str)> = ranked
            .iter()
            .map(|r| (r.rank, r.nominee.as_str()))
            .collect();
        assert_eq!(r, vec![(1, "B"), (2, "A"), (2, "C")]);
    }

    #[test]
    fn groups_in_first_seen_order() {
        let reg = test_registry();
        let reviews = vec![
            ReviewRecord::new("A", "Personal Impact", "a1"),
            ReviewRecord::new("A", "Unknown", "??"),
            ReviewRecord::new("B", "Delegates", "b1"),
            ReviewRecord::new("B", "Personal Impact", "b2"),
        ];
        let groups = group_reviews(&reviews, &reg);
        let names: Vec<&str> = groups.iter().map(|g| g.attribute.as_str()).collect();
        assert_eq!(names, vec!["Personal Impact", "Delegates"]);
        assert_eq!(
            groups[0].reviews,
            vec![
                ("A".to_string(), "a1".to_string()),
                ("B".to_string(), "b2".to_string())
            ]
        );
    }

    #[test]
    fn prompt_contains_all_the_reviews() {
        let g = AttributeGroup {
            attribute: "Delegates".to_string(),
            category: "Business Performance".to_string(),
            max_score: 2.5,
            reviews: vec![
                ("A".to_string(), "Good".to_string()),
                ("B".to_string(), "Fair".to_string()),
            ],
        };
        let p = g.prompt();
        assert!(p.contains("Compare nominees for the attribute \"Delegates\""));
        assert!(p.contains("Assign scores between 1 and 2.5."));
        assert!(p.contains("{ \"Nominee\": \"Name\", \"Score\": 2.0, \"Justification\": \"...\" }"));
        assert!(p.contains("Nominee: A\nReview: Good\n\nNominee: B\nReview: Fair"));
    }

    #[test]
    fn end_to_end_two_nominees() {
        init();
        let reg = Registry::builtin();
        let reviews = vec![
            ReviewRecord::new("A", "Delegates", "Delegates a lot."),
            ReviewRecord::new("B", "Delegates", "Delegates sometimes."),
        ];
        let mut calls: Vec<String> = Vec::new();
        let mut scorer = |attribute: &str, _prompt: &str| -> Result<String, ScoringErrors> {
            calls.push(attribute.to_string());
            Ok(r#"[{"Nominee":"A","Score":2.0,"Justification":"Compared to B..."},
                   {"Nominee":"B","Score":1.0,"Justification":"Less impactful than A."}]"#
                .to_string())
        };
        let ev = run_evaluation(&reviews, &reg, &ScoringRules::DEFAULT_RULES, &mut scorer).unwrap();
        assert_eq!(calls, vec!["Delegates".to_string()]);
        assert_eq!(ev.attribute_scores.len(), 2);
        assert_eq!(
            ev.category_scores,
            vec![
                CategoryRollup {
                    nominee: "A".to_string(),
                    category: "Business Performance".to_string(),
                    raw_score: 2.0,
                    weight: 0.333,
                    weighted_score: 0.67,
                },
                CategoryRollup {
                    nominee: "B".to_string(),
                    category: "Business Performance".to_string(),
                    raw_score: 1.0,
                    weight: 0.333,
                    weighted_score: 0.33,
                },
            ]
        );
        assert_eq!(
            ev.summary,
            vec![
                TotalRollup {
                    nominee: "A".to_string(),
                    total_weighted_score: 0.67,
                },
                TotalRollup {
                    nominee: "B".to_string(),
                    total_weighted_score: 0.33,
                },
            ]
        );
    }

    #[test]
    fn one_call_per_attribute_and_bad_responses_degrade() {
        init();
        let reg = test_registry();
        let reviews = vec![
            ReviewRecord::new("A", "Coaches & Mentors", "..."),
            ReviewRecord::new("A", "Delegates", "..."),
            ReviewRecord::new("B", "Coaches & Mentors", "..."),
            ReviewRecord::new("B", "Delegates", "..."),
            ReviewRecord::new("C", "Not an attribute", "..."),
        ];
        let mut calls: Vec<String> = Vec::new();
        let mut scorer = |attribute: &str, _prompt: &str| -> Result<String, ScoringErrors> {
            calls.push(attribute.to_string());
            if attribute == "Delegates" {
                Ok("I cannot answer this.".to_string())
            } else {
                Ok(r#"[{"Nominee":"A","Score":2},{"Nominee":"B","Score":1}]"#.to_string())
            }
        };
        let ev = run_evaluation(&reviews, &reg, &ScoringRules::DEFAULT_RULES, &mut scorer).unwrap();
        assert_eq!(
            calls,
            vec!["Coaches & Mentors".to_string(), "Delegates".to_string()]
        );
        assert_eq!(ev.attribute_scores.len(), 2);
        assert!(ev
            .attribute_scores
            .iter()
            .all(|r| r.category == "People Development"));
        assert_eq!(ev.attribute_stats.len(), 2);
        assert!(!ev.attribute_stats[0].parse_failed);
        assert_eq!(ev.attribute_stats[0].num_items, 2);
        assert!(ev.attribute_stats[1].parse_failed);
        assert_eq!(ev.attribute_stats[1].num_reviews, 2);
        assert_eq!(ev.summary.len(), 2);
        assert_eq!(ev.summary[0].total_weighted_score, 1.0);
        assert_eq!(ev.summary[1].total_weighted_score, 0.5);
    }

    #[test]
    fn scorer_failure_is_fatal() {
        let reg = test_registry();
        let reviews = vec![ReviewRecord::new("A", "Delegates", "...")];
        let mut scorer = |attribute: &str, _prompt: &str| -> Result<String, ScoringErrors> {
            Err(ScoringErrors::ScorerFailed {
                attribute: attribute.to_string(),
                message: "connection refused".to_string(),
            })
        };
        let res = run_evaluation(&reviews, &reg, &ScoringRules::DEFAULT_RULES, &mut scorer);
        assert!(matches!(res, Err(ScoringErrors::ScorerFailed { .. })));
    }
}
