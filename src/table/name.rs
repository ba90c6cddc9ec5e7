//! Qualified table names

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(scope, name)`; the catalog's lookup key
///
/// The scope separates tables of independent logical stores that share one
/// data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedTableName {
    pub scope: String,
    pub name: String,
}

impl QualifiedTableName {
    const CATALOG_SCOPE: &'static str = "global";
    const CATALOG_NAME: &'static str = "catalog";

    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Reserved name the catalog registers itself under
    pub fn catalog() -> Self {
        Self::new(Self::CATALOG_SCOPE, Self::CATALOG_NAME)
    }

    pub fn is_catalog(&self) -> bool {
        self.scope == Self::CATALOG_SCOPE && self.name == Self::CATALOG_NAME
    }

    /// Rewrites the scope to `prefix:scope`, e.g. with a listening port as prefix
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::new(format!("{}:{}", prefix, self.scope), self.name.clone())
    }
}

impl fmt::Display for QualifiedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.name)
    }
}
