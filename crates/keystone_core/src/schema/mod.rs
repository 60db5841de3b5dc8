//! Optional per-kind field metadata loaded from a declarative document.
//!
//! # Responsibility
//! - Parse `kind -> field -> type | {type, indexed}` documents (JSON or TOML).
//! - Answer field type / indexed-flag queries for entities.
//!
//! # Invariants
//! - Fields declared with a bare type string are not indexed.
//! - Field types are non-empty, trimmed and lowercased.

use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug)]
pub enum SchemaError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Toml(toml::de::Error),
    UnsupportedFormat(String),
    InvalidField { kind: String, field: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read schema document: {err}"),
            Self::Json(err) => write!(f, "invalid JSON schema document: {err}"),
            Self::Toml(err) => write!(f, "invalid TOML schema document: {err}"),
            Self::UnsupportedFormat(ext) => {
                write!(f, "unsupported schema document format `{ext}`; expected json|toml")
            }
            Self::InvalidField { kind, field } => {
                write!(f, "schema field `{kind}.{field}` has an empty type")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Toml(err) => Some(err),
            Self::UnsupportedFormat(_) | Self::InvalidField { .. } => None,
        }
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<toml::de::Error> for SchemaError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

/// Metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub field_type: String,
    pub indexed: bool,
}

/// Field metadata for one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaEntry {
    fields: BTreeMap<String, FieldSchema>,
}

impl SchemaEntry {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    /// Names of indexed fields, sorted.
    pub fn indexed_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, schema)| schema.indexed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Bare(String),
    Detailed {
        #[serde(rename = "type")]
        field_type: String,
        #[serde(default)]
        indexed: bool,
    },
}

type RawDocument = BTreeMap<String, BTreeMap<String, RawField>>;

/// Kind -> `SchemaEntry` registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    kinds: BTreeMap<String, SchemaEntry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> SchemaResult<Self> {
        Self::from_raw(serde_json::from_str(raw)?)
    }

    pub fn from_toml_str(raw: &str) -> SchemaResult<Self> {
        Self::from_raw(toml::from_str(raw)?)
    }

    /// Loads a document, choosing the parser from the file extension.
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let raw = std::fs::read_to_string(path)?;
        let registry = match extension.as_str() {
            "json" => Self::from_json_str(&raw)?,
            "toml" => Self::from_toml_str(&raw)?,
            other => return Err(SchemaError::UnsupportedFormat(other.to_string())),
        };
        info!(
            "event=schema_load module=schema status=ok format={extension} kinds={}",
            registry.kinds.len()
        );
        Ok(registry)
    }

    /// Registers or replaces one field's metadata.
    pub fn insert(
        &mut self,
        kind: impl Into<String>,
        field: impl Into<String>,
        field_type: impl Into<String>,
        indexed: bool,
    ) {
        self.kinds
            .entry(kind.into())
            .or_default()
            .fields
            .insert(
                field.into(),
                FieldSchema {
                    field_type: field_type.into().trim().to_ascii_lowercase(),
                    indexed,
                },
            );
    }

    pub fn entry(&self, kind: &str) -> Option<&SchemaEntry> {
        self.kinds.get(kind)
    }

    pub fn field(&self, kind: &str, field: &str) -> Option<&FieldSchema> {
        self.entry(kind).and_then(|entry| entry.field(field))
    }

    pub fn indexed_fields(&self, kind: &str) -> Vec<&str> {
        self.entry(kind)
            .map(SchemaEntry::indexed_fields)
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    fn from_raw(raw: RawDocument) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for (kind, fields) in raw {
            // Kinds declared with no fields still exist in the registry.
            registry.kinds.entry(kind.clone()).or_default();
            for (field, declared) in fields {
                let (field_type, indexed) = match declared {
                    RawField::Bare(field_type) => (field_type, false),
                    RawField::Detailed {
                        field_type,
                        indexed,
                    } => (field_type, indexed),
                };
                if field_type.trim().is_empty() {
                    return Err(SchemaError::InvalidField { kind, field });
                }
                registry.insert(kind.clone(), field, field_type, indexed);
            }
        }
        Ok(registry)
    }
}
