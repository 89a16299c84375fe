//! Loading the declarative endpoint mapping document.
//!
//! # Design
//! The document has two top-level sections:
//!
//! ```json
//! {
//!   "settings": { "pageSize": 50 },
//!   "mappings": {
//!     "getUser": { "Path": "users/[id]", "Request Type": "GET" },
//!     "listUsers": {
//!       "Path": "users",
//!       "Request Type": "GET",
//!       "Data Structure": { "attributes": { "limit": "<pageSize>" } }
//!     }
//!   }
//! }
//! ```
//!
//! Loading is two-pass. The first parse only reads `settings`. Every quoted
//! marker `"<name>"` in the raw text is then replaced with the JSON rendering
//! of that setting, and the substituted text is parsed again to produce the
//! table. A substitution that breaks the document therefore shows up as a
//! parse error rather than as a silently wrong mapping.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::http::HttpMethod;

/// One endpoint description from the `mappings` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointMapping {
    /// Path template relative to the base path; placeholders look like `[id]`.
    #[serde(rename = "Path")]
    pub path: String,

    #[serde(rename = "Request Type")]
    pub method: HttpMethod,

    #[serde(rename = "Data Structure", default)]
    pub data_structure: Option<DataStructure>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataStructure {
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

impl EndpointMapping {
    /// Body attributes with their default values, when the endpoint takes a body.
    pub fn body_template(&self) -> Option<&Map<String, Value>> {
        self.data_structure.as_ref()?.attributes.as_ref()
    }
}

/// Resolved, read-only table of operation name to endpoint description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    operations: HashMap<String, EndpointMapping>,
}

impl MappingTable {
    /// Read and resolve the mapping document at `path`.
    ///
    /// `overrides` are merged over the document's own `settings` before
    /// substitution.
    pub fn load(
        path: impl AsRef<Path>,
        overrides: Option<&Map<String, Value>>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::MappingNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::MappingRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, overrides)
    }

    /// Resolve an in-memory mapping document.
    pub fn parse(raw: &str, overrides: Option<&Map<String, Value>>) -> Result<Self, ConfigError> {
        let SettingsSection { mut settings } =
            serde_json::from_str(raw).map_err(ConfigError::MappingParse)?;
        if let Some(overrides) = overrides {
            for (name, value) in overrides {
                settings.insert(name.clone(), value.clone());
            }
        }

        let substituted = substitute_settings(raw, &settings)?;
        let MappingsSection { mappings } =
            serde_json::from_str(&substituted).map_err(ConfigError::MappingParse)?;

        let mut operations = HashMap::with_capacity(mappings.0.len());
        for (name, mapping) in mappings.0 {
            if operations.contains_key(&name) {
                return Err(ConfigError::DuplicateOperation { name });
            }
            operations.insert(name, mapping);
        }
        Ok(Self { operations })
    }

    pub fn get(&self, name: &str) -> Option<&EndpointMapping> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl FromStr for MappingTable {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw, None)
    }
}

/// Replace every `"<name>"` marker in `raw` with the JSON text of `settings[name]`.
///
/// Replacement is literal; setting names are never treated as patterns.
/// Settings without a marker are ignored.
pub fn substitute_settings(
    raw: &str,
    settings: &Map<String, Value>,
) -> Result<String, ConfigError> {
    let mut text = raw.to_string();
    for (name, value) in settings {
        let marker = format!("\"<{name}>\"");
        if !text.contains(&marker) {
            continue;
        }
        let rendered = serde_json::to_string(value).map_err(ConfigError::MappingParse)?;
        text = text.replace(&marker, &rendered);
    }
    Ok(text)
}

#[derive(Deserialize)]
struct SettingsSection {
    #[serde(default)]
    settings: Map<String, Value>,
}

#[derive(Deserialize)]
struct MappingsSection {
    #[serde(default)]
    mappings: OperationEntries,
}

/// `mappings` entries in document order, duplicates kept so they can be reported.
#[derive(Default)]
struct OperationEntries(Vec<(String, EndpointMapping)>);

impl<'de> Deserialize<'de> for OperationEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OperationEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of operation name to endpoint description")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, EndpointMapping>()? {
                    entries.push(entry);
                }
                Ok(OperationEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
