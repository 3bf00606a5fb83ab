//! Build a spell from the sample catalog and print how its difficulty moves.
//!
//! Run with: `RUST_LOG=debug cargo run -p spellcraft-core --example build_fireball`

use spellcraft_core::formula::evaluate;
use spellcraft_core::testing::sample_catalog;
use spellcraft_core::{Spell, Spellbook};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Formula Evaluation ===\n");
    for text in ["1+2", "10-8-9", "19/5", "2**3", "10-7+(3*5)/(10**2)", "1/0", "2^3"] {
        match evaluate(text) {
            Ok(value) => println!("{text:>20} = {value}"),
            Err(e) => println!("{text:>20} -> {e}"),
        }
    }

    println!("\n=== Building Fireball ===\n");
    let mut catalog = sample_catalog();
    let mut fireball = Spell::new("fireball");
    fireball.add_component(catalog.id_of("Elements", "Combustion")?);
    let range = catalog.id_of("Range", "SpellRange")?;
    fireball.add_component_with(&mut catalog, range, 100)?;
    fireball.add_component(catalog.id_of("Shape", "Arrow")?);
    let distance = catalog.id_of("Modifiers", "EffectDistance")?;
    fireball.add_component_with(&mut catalog, distance, 20)?;

    for component in fireball.resolve(&catalog)? {
        println!(
            "  {:<10} {:<15} x={:<4} formula={:<8} dc={}",
            component.category,
            component.name,
            component.x,
            component.formula,
            component.dc_with(catalog.operators())?
        );
    }
    println!("\n{}", fireball.describe(&catalog)?);

    // Bolt shares the range component with Fireball.
    let mut bolt = Spell::new("bolt");
    bolt.add_component(range);

    println!("\n=== Customizing Shared Range ===\n");
    for x in [30, 100, 200] {
        catalog.customize(range, x)?;
        println!(
            "  range {x:>3} ft: fireball dc {}, bolt dc {}",
            fireball.dc(&catalog)?,
            bolt.dc(&catalog)?
        );
    }

    let mut book = Spellbook::new("Exodius");
    book.add_spell(fireball)?;
    book.add_spell(bolt)?;
    println!("\nSpellbook '{}': {:?}", book.name, book.spell_list());

    Ok(())
}
