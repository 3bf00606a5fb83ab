//! Spells assembled from catalog components.

use crate::catalog::{Catalog, CatalogError, Component, ComponentId};
use crate::config::STANDARD_CATEGORIES;
use crate::formula::FormulaError;
use serde::{Deserialize, Serialize};

/// A constructed spell: an ordered list of component handles.
///
/// A spell does not own its components. Two spells referencing the same
/// [`ComponentId`] share it, so customizing that component changes both
/// spells' difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    #[serde(default)]
    components: Vec<ComponentId>,
}

impl Spell {
    /// Create an empty spell.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Append a component. The same component may be added more than once.
    pub fn add_component(&mut self, id: ComponentId) {
        self.components.push(id);
    }

    /// Customize the shared component to `x`, then append it.
    pub fn add_component_with(
        &mut self,
        catalog: &mut Catalog,
        id: ComponentId,
        x: i64,
    ) -> Result<(), CatalogError> {
        catalog.customize(id, x)?;
        self.add_component(id);
        Ok(())
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Sum of the components' difficulties at the time of the call.
    ///
    /// Each component is evaluated with the catalog's operator table.
    pub fn dc(&self, catalog: &Catalog) -> Result<i64, CatalogError> {
        self.components
            .iter()
            .try_fold(0i64, |total, id| -> Result<i64, CatalogError> {
                let dc = catalog.dc(*id)?;
                total
                    .checked_add(dc)
                    .ok_or(CatalogError::Formula(FormulaError::OutOfRange(
                        total as f64 + dc as f64,
                    )))
            })
    }

    /// Resolve every component handle against `catalog`.
    pub fn resolve<'c>(&self, catalog: &'c Catalog) -> Result<Vec<&'c Component>, CatalogError> {
        self.components
            .iter()
            .map(|id| catalog.component(*id))
            .collect()
    }

    /// Components of this spell in `category` (case-insensitive), in spell order.
    pub fn components_in<'c>(
        &self,
        catalog: &'c Catalog,
        category: &str,
    ) -> Result<Vec<&'c Component>, CatalogError> {
        Ok(self
            .resolve(catalog)?
            .into_iter()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .collect())
    }

    /// Human-readable summary, e.g.
    /// `"Fireball with a dc of 59 : A burst of flame is a Ranged of 100 ft spell that is a Arrow"`.
    ///
    /// Clauses for categories the spell has no components in are left out.
    /// Components outside the standard categories are appended at the end.
    pub fn describe(&self, catalog: &Catalog) -> Result<String, CatalogError> {
        let [elements, range, shape, modifiers] =
            STANDARD_CATEGORIES.map(|category| self.components_in(catalog, category));
        let others: Vec<&Component> = self
            .resolve(catalog)?
            .into_iter()
            .filter(|c| {
                !STANDARD_CATEGORIES
                    .iter()
                    .any(|standard| c.category.eq_ignore_ascii_case(standard))
            })
            .collect();

        let mut text = format!("{} with a dc of {}", title_case(&self.name), self.dc(catalog)?);
        for (prefix, components, suffix) in [
            (" : ", elements?, ""),
            (" is a ", range?, " spell"),
            (" that is a ", shape?, ""),
            (" that ", modifiers?, ""),
            (" ", others, ""),
        ] {
            if components.is_empty() {
                continue;
            }
            text.push_str(prefix);
            text.push_str(&join_descriptions(&components));
            text.push_str(suffix);
        }
        Ok(text)
    }
}

fn join_descriptions(components: &[&Component]) -> String {
    components
        .iter()
        .map(|c| c.description())
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Uppercase the first letter of every run of letters, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut after_letter = false;
    let mut titled = String::with_capacity(text.len());
    for ch in text.chars() {
        if after_letter {
            titled.extend(ch.to_lowercase());
        } else {
            titled.extend(ch.to_uppercase());
        }
        after_letter = ch.is_alphabetic();
    }
    titled
}
