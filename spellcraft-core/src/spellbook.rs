//! Named collections of spells.

use crate::spell::Spell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from spellbook operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpellbookError {
    #[error("Spell '{spell}' is already in spellbook '{spellbook}'")]
    DuplicateName { spellbook: String, spell: String },

    #[error("Spell '{spell}' not found in spellbook '{spellbook}'")]
    NotFound { spellbook: String, spell: String },
}

/// An ordered set of spells, unique by (case-sensitive) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SpellbookData")]
pub struct Spellbook {
    pub name: String,
    #[serde(default)]
    spells: Vec<Spell>,
}

/// Deserialized form; spells are re-added so names stay unique.
#[derive(Deserialize)]
struct SpellbookData {
    name: String,
    #[serde(default)]
    spells: Vec<Spell>,
}

impl TryFrom<SpellbookData> for Spellbook {
    type Error = SpellbookError;

    fn try_from(data: SpellbookData) -> Result<Self, Self::Error> {
        let mut book = Spellbook::new(data.name);
        for spell in data.spells {
            book.add_spell(spell)?;
        }
        Ok(book)
    }
}

impl Spellbook {
    /// Create an empty spellbook.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spells: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.spells.iter().any(|s| s.name == name)
    }

    /// Add a spell. Fails without changing the book if the name is taken.
    pub fn add_spell(&mut self, spell: Spell) -> Result<(), SpellbookError> {
        if self.contains(&spell.name) {
            return Err(SpellbookError::DuplicateName {
                spellbook: self.name.clone(),
                spell: spell.name,
            });
        }
        debug!(spellbook = %self.name, spell = %spell.name, "Adding spell");
        self.spells.push(spell);
        Ok(())
    }

    /// Add an empty spell and return it for component assembly.
    pub fn create_spell(&mut self, name: impl Into<String>) -> Result<&mut Spell, SpellbookError> {
        self.add_spell(Spell::new(name))?;
        let index = self.spells.len() - 1;
        Ok(&mut self.spells[index])
    }

    /// Remove the spell called `name`.
    ///
    /// Only removes when exactly one spell matches; otherwise nothing changes
    /// and `None` is returned.
    pub fn remove_spell(&mut self, name: &str) -> Option<Spell> {
        let matches: Vec<usize> = self
            .spells
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name == name)
            .map(|(i, _)| i)
            .collect();

        let [index] = matches[..] else {
            return None;
        };
        debug!(spellbook = %self.name, spell = %name, "Removing spell");
        Some(self.spells.remove(index))
    }

    pub fn get_spell(&self, name: &str) -> Result<&Spell, SpellbookError> {
        self.spells
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    pub fn get_spell_mut(&mut self, name: &str) -> Result<&mut Spell, SpellbookError> {
        match self.spells.iter().position(|s| s.name == name) {
            Some(index) => Ok(&mut self.spells[index]),
            None => Err(self.not_found(name)),
        }
    }

    fn not_found(&self, name: &str) -> SpellbookError {
        SpellbookError::NotFound {
            spellbook: self.name.clone(),
            spell: name.to_string(),
        }
    }

    /// Spell names in insertion order.
    pub fn spell_list(&self) -> Vec<&str> {
        self.spells.iter().map(|s| s.name.as_str()).collect()
    }

    /// All spells in insertion order.
    pub fn detailed_spell_list(&self) -> &[Spell] {
        &self.spells
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}
