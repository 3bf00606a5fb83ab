//! Codex persistence for save/load functionality.
//!
//! A [`Codex`] is the unit that gets saved: a catalog together with the
//! spellbooks whose spells reference it. Saves are versioned JSON files with
//! a small metadata header that can be read without loading the whole codex.

use crate::catalog::{Catalog, CatalogError};
use crate::config::CatalogConfig;
use crate::spellbook::Spellbook;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A catalog and the spellbooks built on it.
///
/// Every component id held by a spell in `spellbooks` indexes `catalog`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Codex {
    pub catalog: Catalog,
    #[serde(default)]
    pub spellbooks: Vec<Spellbook>,
}

impl Codex {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            spellbooks: Vec::new(),
        }
    }

    /// Add a spellbook, returning it for further edits.
    pub fn add_spellbook(&mut self, spellbook: Spellbook) -> &mut Spellbook {
        self.spellbooks.push(spellbook);
        let index = self.spellbooks.len() - 1;
        &mut self.spellbooks[index]
    }

    pub fn spellbook(&self, name: &str) -> Option<&Spellbook> {
        self.spellbooks.iter().find(|b| b.name == name)
    }

    pub fn spellbook_mut(&mut self, name: &str) -> Option<&mut Spellbook> {
        self.spellbooks.iter_mut().find(|b| b.name == name)
    }

    /// Total number of spells across all spellbooks.
    pub fn spell_count(&self) -> usize {
        self.spellbooks.iter().map(Spellbook::len).sum()
    }

    /// Check that every spell's components exist in this codex's catalog.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for spell in self.spellbooks.iter().flat_map(|b| b.detailed_spell_list()) {
            spell.resolve(&self.catalog)?;
        }
        Ok(())
    }
}

/// A saved codex with version and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCodex {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (seconds since the Unix epoch).
    pub saved_at: String,

    /// The complete codex.
    pub codex: Codex,

    /// Metadata about the save.
    pub metadata: SaveMetadata,
}

/// Metadata about the save file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Name the codex was saved under.
    pub name: String,

    /// Number of catalog components.
    pub component_count: usize,

    /// Category names in catalog order.
    pub categories: Vec<String>,

    /// Spellbook names.
    pub spellbooks: Vec<String>,

    /// Spells across all spellbooks.
    pub spell_count: usize,

    /// When the save was created (duplicated from parent for peek access).
    #[serde(default)]
    pub saved_at: String,
}

impl SavedCodex {
    /// Wrap a codex for saving under `name`.
    pub fn new(name: impl Into<String>, codex: Codex) -> Self {
        let saved_at = timestamp();
        let metadata = SaveMetadata {
            name: name.into(),
            component_count: codex.catalog.len(),
            categories: codex.catalog.categories().to_vec(),
            spellbooks: codex.spellbooks.iter().map(|b| b.name.clone()).collect(),
            spell_count: codex.spell_count(),
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            codex,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        info!(path = %path.display(), name = %self.metadata.name, "Saved codex");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        saved.codex.validate()?;

        info!(path = %path.display(), name = %saved.metadata.name, "Loaded codex");
        Ok(saved)
    }

    /// Read only the metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        // Parse just enough to get metadata
        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    /// Path to the save file.
    pub path: PathBuf,

    /// Save metadata.
    pub metadata: SaveMetadata,
}

/// List readable save files in a directory, sorted by path.
///
/// Files that are not codex saves are skipped. A missing directory yields an
/// empty list.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let dir = dir.as_ref();
    let mut saves = Vec::new();
    if !fs::try_exists(dir).await? {
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedCodex::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(saves)
}

/// Save file path for a codex name, with unsafe characters replaced.
pub fn save_path(base_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

/// Load catalog data from a JSON file in the structured input format.
pub async fn load_catalog(
    path: impl AsRef<Path>,
    config: CatalogConfig,
) -> Result<Catalog, PersistError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    let catalog = Catalog::from_json_str(&content, config)?;
    info!(path = %path.display(), components = catalog.len(), "Loaded catalog");
    Ok(catalog)
}

/// Current timestamp as seconds since the Unix epoch.
fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fireball, sample_catalog, sample_catalog_json};
    use tempfile::TempDir;

    fn sample_codex() -> Codex {
        let mut catalog = sample_catalog();
        let spell = fireball(&mut catalog);
        let mut codex = Codex::new(catalog);
        codex
            .add_spellbook(Spellbook::new("Exodius"))
            .add_spell(spell)
            .unwrap();
        codex
    }

    #[test]
    fn test_metadata_summarizes_codex() {
        let saved = SavedCodex::new("Campaign", sample_codex());
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.metadata.name, "Campaign");
        assert_eq!(saved.metadata.component_count, 9);
        assert_eq!(saved.metadata.spellbooks, vec!["Exodius"]);
        assert_eq!(saved.metadata.spell_count, 1);
        assert_eq!(saved.metadata.saved_at, saved.saved_at);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("codex.json");

        SavedCodex::new("Campaign", sample_codex())
            .save_json(&path)
            .await
            .expect("Save should succeed");
        assert!(path.exists());

        let loaded = SavedCodex::load_json(&path)
            .await
            .expect("Load should succeed");
        let codex = loaded.codex;
        let book = codex.spellbook("Exodius").expect("spellbook restored");
        let spell = book.get_spell("Fireball").unwrap();
        assert_eq!(spell.dc(&codex.catalog).unwrap(), 59);
        assert_eq!(
            codex.catalog.get("Range", "SpellRange").unwrap().x,
            100
        );
    }

    #[tokio::test]
    async fn test_loaded_spells_still_share_components() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("shared.json");

        let mut codex = sample_codex();
        let range = codex.catalog.id_of("Range", "SpellRange").unwrap();
        let book = codex.spellbook_mut("Exodius").unwrap();
        book.create_spell("Bolt").unwrap().add_component(range);

        SavedCodex::new("Shared", codex)
            .save_json(&path)
            .await
            .unwrap();
        let mut codex = SavedCodex::load_json(&path).await.unwrap().codex;

        codex.catalog.customize(range, 200).unwrap();
        let book = codex.spellbook("Exodius").unwrap();
        assert_eq!(book.get_spell("Bolt").unwrap().dc(&codex.catalog).unwrap(), 90);
        assert_eq!(
            book.get_spell("Fireball").unwrap().dc(&codex.catalog).unwrap(),
            109
        );
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("old.json");

        let mut saved = SavedCodex::new("Old", sample_codex());
        saved.version = 99;
        saved.save_json(&path).await.unwrap();

        assert!(matches!(
            SavedCodex::load_json(&path).await,
            Err(PersistError::VersionMismatch {
                expected: 1,
                found: 99
            })
        ));
        assert!(matches!(
            SavedCodex::peek_metadata(&path).await,
            Err(PersistError::VersionMismatch { .. })
        ));
    }

    /// Save `sample_codex`, let `edit` corrupt the JSON, and write it back.
    async fn write_edited_save(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        SavedCodex::new("Edited", sample_codex())
            .save_json(path)
            .await
            .unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        edit(&mut value);
        std::fs::write(path, value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_load_rejects_dangling_component() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("dangling.json");
        write_edited_save(&path, |value| {
            let components = value["codex"]["spellbooks"][0]["spells"][0]["components"]
                .as_array_mut()
                .unwrap();
            components.push(serde_json::json!(999));
        })
        .await;

        assert!(matches!(
            SavedCodex::load_json(&path).await,
            Err(PersistError::Catalog(CatalogError::UnknownComponent(id))) if id.index() == 999
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_spell_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("duplicate.json");
        write_edited_save(&path, |value| {
            let spells = value["codex"]["spellbooks"][0]["spells"]
                .as_array_mut()
                .unwrap();
            let copy = spells[0].clone();
            spells.push(copy);
        })
        .await;

        assert!(matches!(
            SavedCodex::load_json(&path).await,
            Err(PersistError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = SavedCodex::load_json(temp_dir.path().join("nope.json")).await;
        assert!(matches!(result, Err(PersistError::Io(_))));
    }

    #[tokio::test]
    async fn test_peek_metadata() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("peek.json");
        SavedCodex::new("Peek Test", sample_codex())
            .save_json(&path)
            .await
            .unwrap();

        let metadata = SavedCodex::peek_metadata(&path).await.unwrap();
        assert_eq!(metadata.name, "Peek Test");
        assert_eq!(
            metadata.categories,
            vec!["Elements", "Range", "Shape", "Modifiers"]
        );
    }

    #[tokio::test]
    async fn test_list_saves() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for name in ["Charlie", "Alpha", "Beta"] {
            SavedCodex::new(name, sample_codex())
                .save_json(save_path(temp_dir.path(), name))
                .await
                .unwrap();
        }
        std::fs::write(temp_dir.path().join("notes.txt"), "not a save").unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{}").unwrap();

        let saves = list_saves(temp_dir.path()).await.unwrap();
        let names: Vec<_> = saves.iter().map(|s| s.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Charlie"]);
    }

    #[tokio::test]
    async fn test_list_saves_missing_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let saves = list_saves(temp_dir.path().join("absent")).await.unwrap();
        assert!(saves.is_empty());
    }

    #[test]
    fn test_save_path_sanitizes_name() {
        let path = save_path("/saves", "My Codex: Vol 1");
        assert_eq!(path, PathBuf::from("/saves/My_Codex__Vol_1.json"));
    }

    #[tokio::test]
    async fn test_load_catalog_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("components.json");
        std::fs::write(&path, sample_catalog_json()).unwrap();

        let catalog = load_catalog(&path, CatalogConfig::standard()).await.unwrap();
        assert_eq!(catalog.len(), 9);

        std::fs::write(&path, r#"{ "Elements": [] }"#).unwrap();
        assert!(matches!(
            load_catalog(&path, CatalogConfig::standard()).await,
            Err(PersistError::Catalog(CatalogError::MissingCategory(_)))
        ));
    }
}
