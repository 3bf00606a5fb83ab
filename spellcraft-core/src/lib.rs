//! Spell construction ruleset.
//!
//! This crate provides:
//! - A restricted arithmetic formula evaluator for component difficulty
//! - A catalog of spell components grouped by category
//! - Spells assembled from shared catalog components
//! - Spellbooks and codex persistence
//!
//! # Quick Start
//!
//! ```
//! use spellcraft_core::{Catalog, CatalogConfig, Spell, Spellbook};
//!
//! let data = r#"{
//!     "Elements": [{ "name": "Combustion", "x": 5, "formula": "x*2", "desc": "A burst of flame" }],
//!     "Range": [{ "name": "SpellRange", "x": 30, "formula": "x/2-10", "units": "ft", "desc": "Ranged" }],
//!     "Shape": [],
//!     "Modifiers": []
//! }"#;
//! let mut catalog = Catalog::from_json_str(data, CatalogConfig::standard())?;
//!
//! let mut spell = Spell::new("Firebolt");
//! spell.add_component(catalog.id_of("Elements", "Combustion")?);
//! let range = catalog.id_of("Range", "SpellRange")?;
//! spell.add_component_with(&mut catalog, range, 100)?;
//! assert_eq!(spell.dc(&catalog)?, 50);
//!
//! let mut book = Spellbook::new("Exodius");
//! book.add_spell(spell)?;
//! assert_eq!(book.spell_list(), vec!["Firebolt"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod config;
pub mod formula;
pub mod persist;
pub mod spell;
pub mod spellbook;
pub mod testing;

// Primary public API
pub use catalog::{Catalog, CatalogError, Component, ComponentId};
pub use config::{CatalogConfig, DuplicatePolicy, STANDARD_CATEGORIES};
pub use formula::{evaluate, Formula, FormulaError, OperatorSet, OperatorTable};
pub use persist::{Codex, PersistError, SaveMetadata, SavedCodex};
pub use spell::Spell;
pub use spellbook::{Spellbook, SpellbookError};
