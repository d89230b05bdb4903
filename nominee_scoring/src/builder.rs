pub use crate::config::*;

use std::collections::HashMap;

/// A builder for assembling the criteria registry.
///
/// The attributes are attached to the category declared last.
///
/// ```
/// pub use nominee_scoring::builder::Builder;
/// # use nominee_scoring::ScoringErrors;
///
/// let registry = Builder::new()
///     .category("Business Performance", 0.333)?
///     .attribute("Delegates", 2.5)?
///     .attribute("Personal Impact", 2.5)?
///     .category("People Development", 0.333)?
///     .attribute("Coaches & Mentors", 2.0)?
///     .build()?;
///
/// assert_eq!(registry.attribute("Delegates").map(|c| c.max_score), Some(2.5));
/// assert_eq!(registry.category_weight("People Development"), Some(0.333));
/// assert!(registry.attribute("Unknown").is_none());
///
/// # Ok::<(), ScoringErrors>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    _categories: Vec<Category>,
    _criteria: Vec<Criterion>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _categories: Vec::new(),
            _criteria: Vec::new(),
        }
    }

    pub fn category(mut self, name: &str, weight: f64) -> Result<Builder, ScoringErrors> {
        self.add_category(name, weight)?;
        Ok(self)
    }

    pub fn attribute(mut self, name: &str, max_score: f64) -> Result<Builder, ScoringErrors> {
        self.add_attribute(name, max_score)?;
        Ok(self)
    }

    /// Declares a new category. The following attributes will belong to it.
    pub fn add_category(&mut self, name: &str, weight: f64) -> Result<(), ScoringErrors> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ScoringErrors::InvalidCriteria(format!(
                "category {:?}: the weight must be a non-negative number, got {}",
                name, weight
            )));
        }
        if self._categories.iter().any(|c| c.name == name) {
            return Err(ScoringErrors::InvalidCriteria(format!(
                "category {:?} is declared twice",
                name
            )));
        }
        self._categories.push(Category {
            name: name.to_string(),
            weight,
        });
        Ok(())
    }

    /// Adds an attribute to the last declared category.
    pub fn add_attribute(&mut self, name: &str, max_score: f64) -> Result<(), ScoringErrors> {
        let category = match self._categories.last() {
            Some(c) => c.name.clone(),
            None => {
                return Err(ScoringErrors::InvalidCriteria(format!(
                    "attribute {:?} is declared before any category",
                    name
                )));
            }
        };
        if !max_score.is_finite() || max_score <= 0.0 {
            return Err(ScoringErrors::InvalidCriteria(format!(
                "attribute {:?}: the maximum score must be positive, got {}",
                name, max_score
            )));
        }
        // An attribute belongs to exactly one category.
        if let Some(prev) = self._criteria.iter().find(|c| c.attribute == name) {
            return Err(ScoringErrors::InvalidCriteria(format!(
                "attribute {:?} is declared twice (in categories {:?} and {:?})",
                name, prev.category, category
            )));
        }
        self._criteria.push(Criterion {
            category,
            attribute: name.to_string(),
            max_score,
        });
        Ok(())
    }

    pub fn build(self) -> Result<Registry, ScoringErrors> {
        if self._categories.is_empty() {
            return Err(ScoringErrors::InvalidCriteria(
                "no category was declared".to_string(),
            ));
        }
        for c in self._categories.iter() {
            if !self._criteria.iter().any(|cr| cr.category == c.name) {
                return Err(ScoringErrors::InvalidCriteria(format!(
                    "category {:?} has no attribute",
                    c.name
                )));
            }
        }
        let by_attribute: HashMap<String, usize> = self
            ._criteria
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.attribute.clone(), idx))
            .collect();
        let by_category: HashMap<String, usize> = self
            ._categories
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
        Ok(Registry {
            categories: self._categories,
            criteria: self._criteria,
            by_attribute,
            by_category,
        })
    }
}
