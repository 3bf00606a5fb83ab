//! Catalog loading configuration.

use crate::formula::OperatorSet;
use serde::{Deserialize, Serialize};

/// The categories every complete ruleset defines.
pub const STANDARD_CATEGORIES: [&str; 4] = ["Elements", "Range", "Shape", "Modifiers"];

/// What to do when a category repeats a component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Fail the load with a duplicate error.
    #[default]
    Reject,
    /// Keep the first entry and skip later ones.
    KeepFirst,
}

/// Configuration for building a [`Catalog`](crate::catalog::Catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Handling of repeated names within one category.
    pub duplicates: DuplicatePolicy,

    /// Category keys that must be present in the input.
    pub required_categories: Vec<String>,

    /// Evaluate every formula at its loaded parameter during load.
    pub validate_formulas: bool,

    /// Operators available to this catalog's formulas.
    pub operators: OperatorSet,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogConfig {
    /// Permissive defaults: any categories, duplicates rejected, formulas validated.
    pub fn new() -> Self {
        Self {
            duplicates: DuplicatePolicy::Reject,
            required_categories: Vec::new(),
            validate_formulas: true,
            operators: OperatorSet::Standard,
        }
    }

    /// Defaults plus the four standard categories as required keys.
    pub fn standard() -> Self {
        Self::new().with_required_categories(STANDARD_CATEGORIES)
    }

    /// Set the duplicate name policy.
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Set the category keys the input must contain.
    pub fn with_required_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable formula evaluation at load time.
    pub fn with_formula_validation(mut self, validate: bool) -> Self {
        self.validate_formulas = validate;
        self
    }

    /// Select the operator table.
    pub fn with_operators(mut self, operators: OperatorSet) -> Self {
        self.operators = operators;
        self
    }
}
