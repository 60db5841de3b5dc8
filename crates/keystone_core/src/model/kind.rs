//! Entity kind identifiers and per-type declarations.
//!
//! # Responsibility
//! - Name a category of records (table/collection analogue).
//! - Let each concrete entity type declare its name and validation rules
//!   explicitly instead of relying on runtime type introspection.
//!
//! # Invariants
//! - A kind is always the tableized form of the declared type name.
//! - Kinds are compared by exact string value.

use crate::model::inflect::{foreign_key, tableize};
use crate::validation::RuleSpec;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier of an entity category, e.g. `blog_posts`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(String);

impl Kind {
    /// Wraps an already-derived kind string without inflection.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Derives a kind from a singular type or relation name.
    ///
    /// `BlogPost`, `blog_post` and `blog_posts` all map to `blog_posts`.
    pub fn from_type_name(name: &str) -> Self {
        Self(tableize(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Conventional foreign-key column pointing at records of this kind.
    pub fn foreign_key(&self) -> String {
        foreign_key(&self.0)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Kind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Declaration implemented once per concrete entity type.
///
/// # Example
///
/// ```
/// use keystone_core::{EntityType, RuleSpec};
///
/// struct Post;
///
/// impl EntityType for Post {
///     const TYPE_NAME: &'static str = "Post";
///
///     fn validation_rules() -> RuleSpec {
///         RuleSpec::new().field("title", "required|notEmpty")
///     }
/// }
/// ```
pub trait EntityType: 'static {
    /// Singular CamelCase type name; tableized into the entity kind.
    const TYPE_NAME: &'static str;

    /// Declarative per-field validation rules.
    ///
    /// Read at most once per kind per process; see `RuleCache`.
    fn validation_rules() -> RuleSpec {
        RuleSpec::default()
    }
}
