//! Component catalog.
//!
//! Components live in an arena owned by the [`Catalog`] and are addressed by
//! [`ComponentId`]. Spells store ids rather than copies, so customizing a
//! component is observed by every spell that references it. Use a separate
//! component when a spell needs its own independent value.

use crate::config::{CatalogConfig, DuplicatePolicy};
use crate::formula::{Formula, FormulaError, OperatorTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for catalog construction and lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Invalid catalog data at {location}: {message}")]
    Schema { location: String, message: String },

    #[error("Category not found: {0}")]
    MissingCategory(String),

    #[error("Component not found: {category}/{name}")]
    NotFound { category: String, name: String },

    #[error("Duplicate component '{name}' in category '{category}'")]
    DuplicateComponent { category: String, name: String },

    #[error("Formula for {category}/{name} does not evaluate: {source}")]
    InvalidFormula {
        category: String,
        name: String,
        source: FormulaError,
    },

    #[error("Unknown component id: {0}")]
    UnknownComponent(ComponentId),

    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),
}

impl CatalogError {
    fn schema(location: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Schema {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Handle to a component inside one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named, parameterized rule entry (element, range, shape, modifier, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Category key the component was loaded under.
    pub category: String,
    pub name: String,
    /// The customizable parameter substituted into the formula.
    pub x: i64,
    #[serde(default)]
    pub formula: Formula,
    /// Units of `x` (e.g. "ft").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Fragment used when describing a spell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Sub-type (e.g. the school an element belongs to).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Component {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        x: i64,
        formula: impl Into<Formula>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            x,
            formula: formula.into(),
            units: None,
            desc: None,
            sub: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Difficulty at the current parameter, using the standard operators.
    ///
    /// Recomputed on every call. This ignores the operator set of any catalog
    /// the component sits in; for catalog entries use [`Catalog::dc`], which
    /// is also what spells evaluate through.
    pub fn dc(&self) -> Result<i64, FormulaError> {
        self.formula.dc(self.x)
    }

    pub fn dc_with(&self, table: &OperatorTable) -> Result<i64, FormulaError> {
        self.formula.dc_with(self.x, table)
    }

    /// Replace the parameter. Values computed earlier are not touched.
    pub fn customize(&mut self, x: i64) {
        debug!(component = %self.name, from = self.x, to = x, "Customizing component");
        self.x = x;
    }

    /// Description fragment, with the parameter and units when units are set.
    pub fn description(&self) -> String {
        let base = self.desc.as_deref().unwrap_or(&self.name);
        match &self.units {
            Some(units) => format!("{} of {} {}", base, self.x, units),
            None => base.to_string(),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One entry record as it appears in structured input.
#[derive(Debug, Deserialize)]
struct ComponentRecord {
    name: String,
    #[serde(alias = "parameter")]
    x: i64,
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default, alias = "description")]
    desc: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

impl ComponentRecord {
    fn into_component(self, category: &str) -> Component {
        Component {
            category: category.to_string(),
            name: self.name,
            x: self.x,
            formula: self.formula.map(Formula::from).unwrap_or_default(),
            units: self.units,
            desc: self.desc,
            sub: self.sub,
        }
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Arena of components with a case-insensitive `(category, name)` index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CatalogData", into = "CatalogData")]
pub struct Catalog {
    config: CatalogConfig,
    /// Category names in input order.
    categories: Vec<String>,
    components: Vec<Component>,
    /// Lower-cased (category, name) to the first matching component.
    index: HashMap<(String, String), ComponentId>,
}

/// Serialized form; the index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct CatalogData {
    config: CatalogConfig,
    categories: Vec<String>,
    components: Vec<Component>,
}

impl TryFrom<CatalogData> for Catalog {
    type Error = CatalogError;

    fn try_from(data: CatalogData) -> Result<Self, Self::Error> {
        let mut catalog = Catalog::with_config(data.config);
        for category in data.categories {
            catalog.add_category(&category);
        }
        // Parameters may have been customized since load; only names are rechecked.
        for component in data.components {
            catalog.push(component, false)?;
        }
        Ok(catalog)
    }
}

impl From<Catalog> for CatalogData {
    fn from(catalog: Catalog) -> Self {
        Self {
            config: catalog.config,
            categories: catalog.categories,
            components: catalog.components,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self {
            config,
            categories: Vec::new(),
            components: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a catalog from a mapping of category to a sequence of records.
    pub fn from_value(data: &Value, config: CatalogConfig) -> Result<Self, CatalogError> {
        let categories = data
            .as_object()
            .ok_or_else(|| CatalogError::schema("catalog", "expected a mapping of categories"))?;

        if let Some(missing) = config
            .required_categories
            .iter()
            .find(|required| !categories.contains_key(required.as_str()))
        {
            return Err(CatalogError::MissingCategory(missing.clone()));
        }

        let mut catalog = Catalog::with_config(config);
        for (category, records) in categories {
            let records = records
                .as_array()
                .ok_or_else(|| CatalogError::schema(category, "expected a sequence of components"))?;

            catalog.add_category(category);
            for (index, record) in records.iter().enumerate() {
                let record = ComponentRecord::deserialize(record).map_err(|e| {
                    CatalogError::schema(format!("{category}[{index}]"), e.to_string())
                })?;
                catalog.insert(record.into_component(category))?;
            }
            debug!(category = %category, count = records.len(), "Loaded catalog category");
        }

        Ok(catalog)
    }

    /// Build a catalog from JSON text.
    pub fn from_json_str(json: &str, config: CatalogConfig) -> Result<Self, CatalogError> {
        let data: Value =
            serde_json::from_str(json).map_err(|e| CatalogError::schema("catalog", e.to_string()))?;
        Self::from_value(&data, config)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The operator table this catalog's formulas are evaluated with.
    pub fn operators(&self) -> &'static OperatorTable {
        self.config.operators.table()
    }

    fn find_category(&self, category: &str) -> Option<&String> {
        let key = normalize(category);
        self.categories.iter().find(|c| normalize(c) == key)
    }

    fn add_category(&mut self, category: &str) {
        if self.find_category(category).is_none() {
            self.categories.push(category.to_string());
        }
    }

    /// Add a component, enforcing the configured duplicate policy.
    pub fn insert(&mut self, component: Component) -> Result<ComponentId, CatalogError> {
        self.push(component, self.config.validate_formulas)
    }

    fn push(&mut self, component: Component, validate: bool) -> Result<ComponentId, CatalogError> {
        if validate {
            component
                .dc_with(self.operators())
                .map_err(|source| CatalogError::InvalidFormula {
                    category: component.category.clone(),
                    name: component.name.clone(),
                    source,
                })?;
        }

        let key = (normalize(&component.category), normalize(&component.name));
        let id = ComponentId(self.components.len());

        if self.index.contains_key(&key) {
            match self.config.duplicates {
                DuplicatePolicy::Reject => {
                    return Err(CatalogError::DuplicateComponent {
                        category: component.category,
                        name: component.name,
                    });
                }
                DuplicatePolicy::KeepFirst => {
                    warn!(
                        category = %component.category,
                        name = %component.name,
                        "Duplicate component shadowed by an earlier entry"
                    );
                }
            }
        } else {
            self.index.insert(key, id);
        }

        self.add_category(&component.category);
        self.components.push(component);
        Ok(id)
    }

    /// Look up the id of a component (case-insensitive on both keys).
    pub fn id_of(&self, category: &str, name: &str) -> Result<ComponentId, CatalogError> {
        self.index
            .get(&(normalize(category), normalize(name)))
            .copied()
            .ok_or_else(|| CatalogError::NotFound {
                category: category.to_string(),
                name: name.to_string(),
            })
    }

    pub fn get(&self, category: &str, name: &str) -> Result<&Component, CatalogError> {
        let id = self.id_of(category, name)?;
        self.component(id)
    }

    pub fn get_mut(&mut self, category: &str, name: &str) -> Result<&mut Component, CatalogError> {
        let id = self.id_of(category, name)?;
        self.component_mut(id)
    }

    pub fn component(&self, id: ComponentId) -> Result<&Component, CatalogError> {
        self.components
            .get(id.0)
            .ok_or(CatalogError::UnknownComponent(id))
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component, CatalogError> {
        self.components
            .get_mut(id.0)
            .ok_or(CatalogError::UnknownComponent(id))
    }

    /// Set a component's parameter. Every spell holding `id` sees the change.
    pub fn customize(&mut self, id: ComponentId, x: i64) -> Result<(), CatalogError> {
        self.component_mut(id)?.customize(x);
        Ok(())
    }

    /// Difficulty of one component under this catalog's operator table.
    ///
    /// The authoritative difficulty of a catalog entry.
    pub fn dc(&self, id: ComponentId) -> Result<i64, CatalogError> {
        Ok(self.component(id)?.dc_with(self.operators())?)
    }

    /// All components of a category, in load order.
    pub fn by_category(&self, category: &str) -> Result<Vec<&Component>, CatalogError> {
        if self.find_category(category).is_none() {
            return Err(CatalogError::MissingCategory(category.to_string()));
        }
        let key = normalize(category);
        Ok(self
            .components
            .iter()
            .filter(|c| normalize(&c.category) == key)
            .collect())
    }

    /// Every component with this name, across categories.
    pub fn by_name(&self, name: &str) -> Vec<&Component> {
        let key = normalize(name);
        self.components
            .iter()
            .filter(|c| normalize(&c.name) == key)
            .collect()
    }

    /// Category names in the order they were first seen.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.find_category(category).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i), c))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::OperatorSet;
    use crate::testing::{sample_catalog, sample_catalog_json};
    use serde_json::json;

    #[test]
    fn test_load_sample_catalog() {
        let catalog = sample_catalog();
        assert_eq!(catalog.len(), 9);
        assert_eq!(
            catalog.categories(),
            &["Elements", "Range", "Shape", "Modifiers"]
        );
    }

    #[test]
    fn test_get_component() {
        let catalog = sample_catalog();
        let combustion = catalog.get("Elements", "Combustion").unwrap();
        assert_eq!(combustion.name, "Combustion");
        assert_eq!(combustion.category, "Elements");
        assert_eq!(combustion.sub.as_deref(), Some("Fire"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = sample_catalog();
        let a = catalog.id_of("elements", "COMBUSTION").unwrap();
        let b = catalog.id_of("Elements", "Combustion").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_component_is_not_found() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.get("Elements", "NonExistant").unwrap_err(),
            CatalogError::NotFound {
                category: "Elements".to_string(),
                name: "NonExistant".to_string(),
            }
        );
        // Right name, wrong category
        assert!(catalog.get("Range", "Combustion").is_err());
    }

    #[test]
    fn test_cross_category_names_are_distinct() {
        let catalog = sample_catalog();
        let shape = catalog.get("Shape", "Arrow").unwrap();
        let modifier = catalog.get("Modifiers", "Arrow").unwrap();
        assert_ne!(shape.formula, modifier.formula);
        assert_eq!(catalog.by_name("arrow").len(), 2);
    }

    #[test]
    fn test_components_by_category() {
        let catalog = sample_catalog();
        for category in ["Elements", "Range", "Shape", "Modifiers"] {
            let components = catalog.by_category(category).unwrap();
            assert!(!components.is_empty(), "{category} should not be empty");
            assert!(components.iter().all(|c| c.category == category));
        }
        assert_eq!(
            catalog.by_category("Durations").unwrap_err(),
            CatalogError::MissingCategory("Durations".to_string())
        );
    }

    #[test]
    fn test_component_dc_and_customize() {
        let mut catalog = sample_catalog();
        let id = catalog.id_of("Range", "SpellRange").unwrap();

        catalog.customize(id, 100).unwrap();
        assert_eq!(catalog.dc(id).unwrap(), 40);

        catalog.customize(id, 200).unwrap();
        assert_eq!(catalog.dc(id).unwrap(), 90);
        assert_eq!(catalog.component(id).unwrap().x, 200);
    }

    #[test]
    fn test_standalone_component() {
        let mut bolt = Component::new("Shape", "Bolt", 5, "x+4")
            .with_units("ft")
            .with_desc("Test spell");
        assert_eq!(bolt.dc().unwrap(), 9);
        bolt.customize(6);
        assert_eq!(bolt.x, 6);
        assert_eq!(bolt.dc().unwrap(), 10);
        assert_eq!(bolt.description(), "Test spell of 6 ft");
        assert_eq!(bolt.to_string(), "Bolt");
    }

    #[test]
    fn test_description_falls_back_to_name() {
        let component = Component::new("Elements", "Gale", 3, "x");
        assert_eq!(component.description(), "Gale");
    }

    #[test]
    fn test_formula_defaults_to_identity() {
        let catalog = sample_catalog();
        let blast = catalog.get("Elements", "Blast").unwrap();
        assert_eq!(blast.formula, Formula::identity());
        assert_eq!(blast.dc().unwrap(), blast.x);
    }

    #[test]
    fn test_parameter_alias_and_description_alias() {
        let data = json!({
            "Range": [{ "name": "Far", "parameter": 60, "formula": "x/3", "description": "Far away" }]
        });
        let catalog = Catalog::from_value(&data, CatalogConfig::new()).unwrap();
        let far = catalog.get("Range", "Far").unwrap();
        assert_eq!(far.x, 60);
        assert_eq!(far.desc.as_deref(), Some("Far away"));
        assert_eq!(far.dc().unwrap(), 20);
    }

    #[test]
    fn test_missing_required_fields() {
        let data = json!({ "Elements": [{ "x": 5, "formula": "x" }] });
        match Catalog::from_value(&data, CatalogConfig::new()) {
            Err(CatalogError::Schema { location, message }) => {
                assert_eq!(location, "Elements[0]");
                assert!(message.contains("name"), "message was {message}");
            }
            other => panic!("Expected schema error, got {other:?}"),
        }

        let data = json!({ "Elements": [{ "name": "Combustion" }] });
        assert!(matches!(
            Catalog::from_value(&data, CatalogConfig::new()),
            Err(CatalogError::Schema { .. })
        ));
    }

    #[test]
    fn test_mistyped_fields() {
        let data = json!({ "Elements": [{ "name": "Combustion", "x": "five" }] });
        assert!(matches!(
            Catalog::from_value(&data, CatalogConfig::new()),
            Err(CatalogError::Schema { .. })
        ));

        let data = json!({ "Elements": { "name": "Combustion", "x": 5 } });
        assert_eq!(
            Catalog::from_value(&data, CatalogConfig::new()).unwrap_err(),
            CatalogError::Schema {
                location: "Elements".to_string(),
                message: "expected a sequence of components".to_string(),
            }
        );

        assert!(matches!(
            Catalog::from_value(&json!([1, 2]), CatalogConfig::new()),
            Err(CatalogError::Schema { .. })
        ));
        assert!(matches!(
            Catalog::from_json_str("{not json", CatalogConfig::new()),
            Err(CatalogError::Schema { .. })
        ));
    }

    #[test]
    fn test_required_categories() {
        let data = json!({ "Elements": [], "Range": [], "Shape": [] });
        assert_eq!(
            Catalog::from_value(&data, CatalogConfig::standard()).unwrap_err(),
            CatalogError::MissingCategory("Modifiers".to_string())
        );

        // An empty category is still a known category.
        let catalog = Catalog::from_value(&data, CatalogConfig::new()).unwrap();
        assert!(catalog.by_category("Shape").unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_rejected_by_default() {
        let data = json!({
            "Elements": [
                { "name": "Combustion", "x": 5, "formula": "x*2" },
                { "name": "combustion", "x": 1 }
            ]
        });
        assert_eq!(
            Catalog::from_value(&data, CatalogConfig::new()).unwrap_err(),
            CatalogError::DuplicateComponent {
                category: "Elements".to_string(),
                name: "combustion".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicates_keep_first() {
        let data = json!({
            "Elements": [
                { "name": "Combustion", "x": 5, "formula": "x*2" },
                { "name": "Combustion", "x": 1 }
            ]
        });
        let config = CatalogConfig::new().with_duplicates(DuplicatePolicy::KeepFirst);
        let catalog = Catalog::from_value(&data, config).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Elements", "Combustion").unwrap().x, 5);
        assert_eq!(catalog.by_name("Combustion").len(), 2);
    }

    #[test]
    fn test_formula_validation_on_load() {
        let data = json!({ "Elements": [{ "name": "Broken", "x": 1, "formula": "x%2" }] });
        match Catalog::from_value(&data, CatalogConfig::new()) {
            Err(CatalogError::InvalidFormula { name, source, .. }) => {
                assert_eq!(name, "Broken");
                assert!(matches!(source, FormulaError::UnsupportedOperator { .. }));
            }
            other => panic!("Expected invalid formula, got {other:?}"),
        }

        let lenient = CatalogConfig::new().with_formula_validation(false);
        let catalog = Catalog::from_value(&data, lenient).unwrap();
        let id = catalog.id_of("Elements", "Broken").unwrap();
        assert!(matches!(catalog.dc(id), Err(CatalogError::Formula(_))));
    }

    #[test]
    fn test_legacy_operator_set() {
        let data = json!({ "Shape": [{ "name": "Sphere", "x": 10, "formula": "x**2" }] });
        let legacy = CatalogConfig::new().with_operators(OperatorSet::Legacy);
        assert!(matches!(
            Catalog::from_value(&data, legacy),
            Err(CatalogError::InvalidFormula {
                source: FormulaError::UnmappedOperator(_),
                ..
            })
        ));
    }

    #[test]
    fn test_catalog_dc_uses_configured_operators() {
        let data = json!({ "Shape": [{ "name": "Sphere", "x": 10, "formula": "x**2" }] });
        let legacy = CatalogConfig::new()
            .with_operators(OperatorSet::Legacy)
            .with_formula_validation(false);
        let catalog = Catalog::from_value(&data, legacy).unwrap();
        let sphere = catalog.id_of("Shape", "Sphere").unwrap();

        assert_eq!(
            catalog.dc(sphere),
            Err(CatalogError::Formula(FormulaError::UnmappedOperator(
                "**".to_string()
            )))
        );
        // Standalone evaluation always has the full operator set.
        assert_eq!(catalog.component(sphere).unwrap().dc(), Ok(100));

        let mut spell = crate::spell::Spell::new("Orb");
        spell.add_component(sphere);
        assert!(spell.dc(&catalog).is_err());
    }

    #[test]
    fn test_unknown_component_id() {
        let catalog = sample_catalog();
        let stranger = ComponentId(999);
        assert_eq!(
            catalog.component(stranger).unwrap_err(),
            CatalogError::UnknownComponent(stranger)
        );
    }

    #[test]
    fn test_insert_registers_category() {
        let mut catalog = Catalog::new();
        let id = catalog
            .insert(Component::new("Durations", "Lingering", 3, "x*4"))
            .unwrap();
        assert!(catalog.has_category("durations"));
        assert_eq!(catalog.dc(id).unwrap(), 12);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_index() {
        let mut catalog = sample_catalog();
        let id = catalog.id_of("Range", "SpellRange").unwrap();
        catalog.customize(id, 100).unwrap();

        let json = serde_json::to_string(&catalog).unwrap();
        let restored: Catalog = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.len(), catalog.len());
        assert_eq!(restored.categories(), catalog.categories());
        assert_eq!(restored.id_of("range", "spellrange").unwrap(), id);
        assert_eq!(restored.dc(id).unwrap(), 40);
    }

    #[test]
    fn test_sample_json_matches_sample_catalog() {
        let catalog = Catalog::from_json_str(sample_catalog_json(), CatalogConfig::standard()).unwrap();
        assert_eq!(catalog.len(), sample_catalog().len());
    }
}
