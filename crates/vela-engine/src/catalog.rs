//! Definition catalogue used by the renderer
//!
//! Definitions come from the cluster, from local files, or both; later
//! insertions replace earlier ones with the same kind and name.

use std::collections::BTreeMap;
use std::path::Path;

use vela_core::{Definition, DefinitionKind, InputDocument};
use walkdir::WalkDir;

use crate::cue::CueRuntime;
use crate::error::{EngineError, Result};
use crate::loader;
use crate::suggestions::suggest_definition;

const DEFINITION_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "cue"];

#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    definitions: BTreeMap<(DefinitionKind, String), Definition>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalogue from already decoded definitions
    pub fn from_definitions(definitions: impl IntoIterator<Item = Definition>) -> Self {
        let mut catalog = Self::new();
        for def in definitions {
            catalog.insert(def);
        }
        catalog
    }

    /// Build a catalogue from canonical documents, skipping non-definitions
    pub fn from_documents(docs: &[InputDocument]) -> Result<Self> {
        let mut catalog = Self::new();
        for doc in docs {
            if DefinitionKind::from_resource_kind(&doc.type_meta().kind).is_none() {
                tracing::warn!(file = %doc.name, kind = %doc.type_meta().kind, "skipping non-definition document");
                continue;
            }
            catalog.insert(Definition::from_document(doc)?);
        }
        Ok(catalog)
    }

    /// Load definitions from files and directories
    ///
    /// Directories are walked recursively in name order; only `.yaml`,
    /// `.yml`, `.json` and `.cue` files are read.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P], cue: &dyn CueRuntime) -> Result<Self> {
        let mut docs = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                for entry in WalkDir::new(path).sort_by_file_name() {
                    let entry = entry.map_err(|e| EngineError::Io(std::io::Error::other(e.to_string())))?;
                    if entry.file_type().is_file() && has_definition_extension(entry.path()) {
                        docs.extend(read_definition_file(entry.path(), cue)?);
                    }
                }
            } else {
                docs.extend(read_definition_file(path, cue)?);
            }
        }

        let catalog = Self::from_documents(&docs)?;
        tracing::debug!(count = catalog.len(), "loaded local definitions");
        Ok(catalog)
    }

    /// Insert a definition, returning the one it replaced
    pub fn insert(&mut self, def: Definition) -> Option<Definition> {
        self.definitions.insert((def.kind, def.name.clone()), def)
    }

    /// Add every definition of `other`, replacing duplicates
    pub fn overlay(&mut self, other: DefinitionCatalog) {
        self.definitions.extend(other.definitions);
    }

    /// Look a definition up, with a suggestion when it is missing
    pub fn get(&self, kind: DefinitionKind, name: &str) -> Result<&Definition> {
        self.definitions
            .get(&(kind, name.to_string()))
            .ok_or_else(|| EngineError::DefinitionNotFound {
                kind,
                name: name.to_string(),
                suggestion: suggest_definition(name, &self.names(kind)),
            })
    }

    pub fn contains(&self, kind: DefinitionKind, name: &str) -> bool {
        self.definitions.contains_key(&(kind, name.to_string()))
    }

    /// Definitions of one kind, sorted by name
    pub fn list(&self, kind: DefinitionKind) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|(_, def)| def)
    }

    pub fn names(&self, kind: DefinitionKind) -> Vec<&str> {
        self.list(kind).map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn has_definition_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DEFINITION_EXTENSIONS.contains(&e))
}

fn read_definition_file(path: &Path, cue: &dyn CueRuntime) -> Result<Vec<InputDocument>> {
    let data = std::fs::read(path)?;
    loader::decode_documents(&path.display().to_string(), &data, cue)
}
