//! Testing utilities for spell construction.
//!
//! This module provides:
//! - A small but complete sample catalog (all four standard categories)
//! - A ready-made "Fireball" spell built on that catalog
//! - Assertion helpers for difficulty checks

use crate::catalog::Catalog;
use crate::config::CatalogConfig;
use crate::spell::Spell;

/// Sample catalog data in the structured input format.
///
/// Difficulties at the loaded parameters:
/// Combustion 10, Frost 12, Blast 10, Touch 0, SpellRange 5, Arrow (shape) 5,
/// Sphere 10, EffectDistance 2, Arrow (modifier) 3.
pub fn sample_catalog_json() -> &'static str {
    r#"{
    "Elements": [
        { "name": "Combustion", "x": 5, "formula": "x*2", "desc": "A burst of flame", "sub": "Fire" },
        { "name": "Frost", "x": 4, "formula": "x*3", "desc": "Biting cold", "sub": "Water" },
        { "name": "Blast", "x": 10, "desc": "A concussive force" }
    ],
    "Range": [
        { "name": "Touch", "x": 0, "formula": "x", "desc": "Touch" },
        { "name": "SpellRange", "x": 30, "formula": "x/2-10", "units": "ft", "desc": "Ranged" }
    ],
    "Shape": [
        { "name": "Arrow", "x": 1, "formula": "x*5", "desc": "Arrow" },
        { "name": "Sphere", "x": 10, "formula": "x**2/10", "units": "ft", "desc": "Sphere with a radius" }
    ],
    "Modifiers": [
        { "name": "EffectDistance", "x": 10, "formula": "x/5", "units": "ft", "desc": "reaches further" },
        { "name": "Arrow", "x": 2, "formula": "x+1", "desc": "splits into arrows" }
    ]
}"#
}

/// Load [`sample_catalog_json`] with the standard configuration.
///
/// Panics if the sample data does not load; it is fixed test data.
pub fn sample_catalog() -> Catalog {
    Catalog::from_json_str(sample_catalog_json(), CatalogConfig::standard())
        .expect("sample catalog data is valid")
}

/// Build the reference Fireball on `catalog`.
///
/// Combustion + SpellRange at 100 ft + Arrow + EffectDistance at 20 ft,
/// for a difficulty of 10 + 40 + 5 + 4 = 59. Customizes the shared
/// SpellRange and EffectDistance components.
pub fn fireball(catalog: &mut Catalog) -> Spell {
    let mut spell = Spell::new("Fireball");
    for (category, name, x) in [
        ("Elements", "Combustion", None),
        ("Range", "SpellRange", Some(100)),
        ("Shape", "Arrow", None),
        ("Modifiers", "EffectDistance", Some(20)),
    ] {
        let id = catalog
            .id_of(category, name)
            .expect("sample component exists");
        match x {
            Some(x) => spell
                .add_component_with(catalog, id, x)
                .expect("sample component exists"),
            None => spell.add_component(id),
        }
    }
    spell
}

/// Assert that `spell` currently evaluates to `expected` on `catalog`.
pub fn assert_spell_dc(spell: &Spell, catalog: &Catalog, expected: i64) {
    let actual = spell
        .dc(catalog)
        .unwrap_or_else(|e| panic!("Spell '{}' failed to evaluate: {e}", spell.name));
    assert_eq!(
        actual, expected,
        "Spell '{}' expected dc {}, got {}",
        spell.name, expected, actual
    );
}
