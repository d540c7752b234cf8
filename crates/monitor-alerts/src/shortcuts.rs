//! Alert expression shortcut definitions.
//!
//! A shortcut is a named template written as `@name` or `@name:arg1,arg2`
//! in an alert expression. The table starts from the built-in definitions
//! and can be extended or overridden from YAML files on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlertError, Result};

/// Character that marks an alert expression as a shortcut reference.
pub const SHORTCUT_SIGIL: char = '@';

/// Lowercase file name prefix of shortcut override files.
pub const OVERRIDE_FILE_PREFIX: &str = "alertif";

const BUILTIN_ORIGIN: &str = "built-in";
const BUILTIN: &str = include_str!("shortcuts.yml");

/// One shortcut macro.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutDefinition {
    /// Name without the sigil, filled in from the table key.
    #[serde(skip)]
    pub name: String,
    /// Template of the expanded alert expression.
    #[serde(rename = "expanded")]
    pub expression_template: String,
    /// Annotation templates applied when the alert does not set the key.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Label templates applied when the alert does not set the key.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ShortcutDefinition {
    /// Creates a definition with no default annotations or labels.
    #[must_use]
    pub fn new(name: &str, expression_template: impl Into<String>) -> Self {
        Self {
            name: canonical_name(name),
            expression_template: expression_template.into(),
            ..Self::default()
        }
    }

    /// Adds a default annotation template.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), template.into());
        self
    }

    /// Adds a default label template.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.labels.insert(key.into(), template.into());
        self
    }
}

/// Lookup table of shortcut definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    definitions: BTreeMap<String, ShortcutDefinition>,
}

impl ShortcutTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the built-in definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded definitions fail to parse.
    pub fn builtin() -> Result<Self> {
        let mut table = Self::new();
        table.merge_yaml(BUILTIN_ORIGIN, BUILTIN)?;
        Ok(table)
    }

    /// Merges definitions from a YAML document, replacing existing names.
    ///
    /// The document is a mapping from shortcut name to definition. Returns
    /// the number of definitions read.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid definition mapping.
    pub fn merge_yaml(&mut self, origin: &str, yaml: &str) -> Result<usize> {
        let parsed: BTreeMap<String, ShortcutDefinition> =
            serde_yaml::from_str(yaml).map_err(|e| AlertError::ShortcutParse {
                origin: origin.to_string(),
                reason: e.to_string(),
            })?;

        let count = parsed.len();
        for (name, mut definition) in parsed {
            definition.name = canonical_name(&name);
            if let Some(previous) = self.definitions.get(&definition.name) {
                debug!(shortcut = %previous.name, origin, "overriding shortcut");
            }
            self.insert(definition);
        }
        Ok(count)
    }

    /// Merges every override file found in `dir`.
    ///
    /// Files whose lowercase name starts with [`OVERRIDE_FILE_PREFIX`] are
    /// read in name order, so a later file wins over an earlier one. A
    /// missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a matching file cannot be read or parsed.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(AlertError::ShortcutRead {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_override_file(path))
            .collect();
        paths.sort();

        let mut total = 0;
        for path in paths {
            let yaml = fs::read_to_string(&path).map_err(|source| AlertError::ShortcutRead {
                path: path.clone(),
                source,
            })?;
            let count = self.merge_yaml(&path.display().to_string(), &yaml)?;
            info!(path = %path.display(), count, "loaded shortcut overrides");
            total += count;
        }
        Ok(total)
    }

    /// Inserts a definition, replacing any existing one with the same name.
    pub fn insert(&mut self, definition: ShortcutDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Looks up a definition by name, with or without the sigil.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShortcutDefinition> {
        self.definitions.get(&canonical_name(name))
    }

    /// Returns the defined names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if the table has no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn canonical_name(name: &str) -> String {
    name.trim()
        .trim_start_matches(SHORTCUT_SIGIL)
        .trim_end_matches(':')
        .to_string()
}

fn is_override_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_lowercase().starts_with(OVERRIDE_FILE_PREFIX))
}
