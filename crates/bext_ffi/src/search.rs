//! File-existence search extension.
//!
//! # Responsibility
//! - Load search definitions from `<data path>/searches.json` once.
//! - Answer `search(id, variable)` by formatting the definition's path
//!   through the engine and storing `1`/`0` in a numeric variable.
//!
//! # Invariants
//! - Search ids are unique; duplicates reject the whole file.
//! - A missing definitions file yields an extension with no searches.

use bext_core::extension::{BundleExtension, ExtensionContext, ExtensionError};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

pub const SEARCH_FILE_NAME: &str = "searches.json";

/// What a search path must resolve to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    File,
    Directory,
    #[default]
    Any,
}

impl SearchKind {
    fn matches(self, path: &Path) -> bool {
        match self {
            Self::File => path.is_file(),
            Self::Directory => path.is_dir(),
            Self::Any => path.exists(),
        }
    }
}

/// One search registered in the bundle data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchDefinition {
    pub id: String,
    /// Path template; `[Name]` references are expanded by the engine.
    pub path: String,
    #[serde(default)]
    pub kind: SearchKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchFile {
    #[serde(default)]
    searches: Vec<SearchDefinition>,
}

/// Parses a definitions document into an id-keyed map.
pub fn parse_searches(json: &str) -> Result<BTreeMap<String, SearchDefinition>, ExtensionError> {
    let file: SearchFile = serde_json::from_str(json)
        .map_err(|err| ExtensionError::InvalidData(format!("{SEARCH_FILE_NAME}: {err}")))?;

    let mut searches = BTreeMap::new();
    for definition in file.searches {
        if definition.id.trim().is_empty() {
            return Err(ExtensionError::InvalidData("empty search id".to_string()));
        }
        if searches.contains_key(&definition.id) {
            return Err(ExtensionError::InvalidData(format!(
                "duplicate search id `{}`",
                definition.id
            )));
        }
        searches.insert(definition.id.clone(), definition);
    }
    Ok(searches)
}

/// Reads `<data_path>/searches.json`; a missing file means no searches.
pub fn load_searches(
    data_path: &Path,
) -> Result<BTreeMap<String, SearchDefinition>, ExtensionError> {
    let file = data_path.join(SEARCH_FILE_NAME);
    match std::fs::read_to_string(&file) {
        Ok(json) => parse_searches(&json),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(ExtensionError::InvalidData(format!(
            "cannot read `{}`: {err}",
            file.display()
        ))),
    }
}

/// Bundle extension answering path-existence searches.
#[derive(Debug, Default)]
pub struct FileSearchExtension {
    searches: OnceLock<BTreeMap<String, SearchDefinition>>,
}

impl FileSearchExtension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded definitions; empty before initialization.
    pub fn definitions(&self) -> impl Iterator<Item = &SearchDefinition> {
        self.searches.get().into_iter().flat_map(BTreeMap::values)
    }
}

impl BundleExtension for FileSearchExtension {
    fn initialize(&self, context: &ExtensionContext<'_>) -> Result<(), ExtensionError> {
        let data_path = context
            .data_path
            .ok_or(ExtensionError::InvalidArgument("data_path"))?;
        let searches = load_searches(Path::new(data_path))?;
        let count = searches.len();
        self.searches
            .set(searches)
            .map_err(|_| ExtensionError::AlreadyInitialized)?;
        info!(
            "event=searches_load module=search status=ok count={}",
            count
        );
        Ok(())
    }

    fn search(
        &self,
        context: &ExtensionContext<'_>,
        id: &str,
        variable: &str,
    ) -> Result<(), ExtensionError> {
        let definition = self
            .searches
            .get()
            .and_then(|searches| searches.get(id))
            .ok_or_else(|| ExtensionError::NotFound(id.to_string()))?;

        let path = context.engine.format_string(&definition.path)?;
        let found = definition.kind.matches(Path::new(&path));
        context
            .engine
            .numeric_variables()
            .set(variable, i64::from(found))?;

        debug!(
            "event=search_run module=search status=ok id={} variable={} found={}",
            id, variable, found
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_searches, SearchKind};
    use bext_core::HResult;

    #[test]
    fn kind_defaults_to_any() {
        let searches = parse_searches(r#"{"searches":[{"id":"A","path":"[Dir]\\a.txt"}]}"#)
            .expect("valid definitions");
        assert_eq!(searches["A"].kind, SearchKind::Any);
        assert_eq!(searches["A"].path, "[Dir]\\a.txt");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_searches(
            r#"{"searches":[{"id":"A","path":"x"},{"id":"A","path":"y","kind":"file"}]}"#,
        )
        .expect_err("duplicate id");
        assert_eq!(err.status(), HResult::E_INVALIDDATA);
    }

    #[test]
    fn malformed_documents_are_invalid_data() {
        let err = parse_searches(r#"{"searches":[{"id":"A"}]}"#).expect_err("missing path");
        assert_eq!(err.status(), HResult::E_INVALIDDATA);
        let err = parse_searches(r#"{"lookups":[]}"#).expect_err("unknown field");
        assert_eq!(err.status(), HResult::E_INVALIDDATA);
    }
}
