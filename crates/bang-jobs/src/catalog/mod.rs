//! Job catalog loading and lookup.
//!
//! The [`JobCatalog`] maps job names to the deployment resource specs that
//! implement them. It is read once from a YAML document shaped like
//!
//! ```yaml
//! nightly_rebuild:
//!   bang-stacks:
//!     - /etc/bang/stacks/web.yml
//!     - /etc/bang/stacks/db.yml
//! ```
//!
//! and is immutable afterwards. Lookups never touch the filesystem.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CatalogLoadError, JobNotFound};
use crate::job::Job;

const CATALOG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::catalog");
const INLINE_SOURCE: &str = "<inline>";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobDefinition {
    #[serde(rename = "bang-stacks")]
    resource_specs: Vec<String>,
}

impl JobDefinition {
    /// Creates a definition from its resource specs.
    #[must_use]
    pub const fn new(resource_specs: Vec<String>) -> Self {
        Self { resource_specs }
    }

    /// Resource specs in declaration order.
    #[must_use]
    pub fn resource_specs(&self) -> &[String] {
        &self.resource_specs
    }
}

/// Immutable mapping from job name to [`JobDefinition`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCatalog {
    definitions: BTreeMap<String, JobDefinition>,
}

impl JobCatalog {
    /// Reads and parses the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::Read`] when the file cannot be read and
    /// [`CatalogLoadError::Parse`] when it is not a valid catalog.
    pub fn load(path: &Utf8Path) -> Result<Self, CatalogLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| CatalogLoadError::Read {
                path: path.to_owned(),
                source: Arc::new(source),
            })?;
        let catalog = Self::parse(path, &contents)?;
        debug!(
            target: CATALOG_TARGET,
            path = %path,
            jobs = catalog.len(),
            "loaded job catalog"
        );
        Ok(catalog)
    }

    /// Parses a catalog held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::Parse`] when `contents` is not a valid
    /// catalog.
    pub fn from_yaml(contents: &str) -> Result<Self, CatalogLoadError> {
        Self::parse(Utf8Path::new(INLINE_SOURCE), contents)
    }

    fn parse(path: &Utf8Path, contents: &str) -> Result<Self, CatalogLoadError> {
        let invalid = |message: String| CatalogLoadError::Parse {
            path: Utf8PathBuf::from(path),
            message,
        };
        if contents.trim().is_empty() {
            return Err(invalid(String::from("the catalog defines no jobs")));
        }
        let definitions: BTreeMap<String, JobDefinition> =
            serde_saphyr::from_str(contents).map_err(|err| invalid(err.to_string()))?;
        if let Some(name) = definitions.keys().find(|name| name.trim().is_empty()) {
            return Err(invalid(format!("job name '{name}' is blank")));
        }
        Ok(Self { definitions })
    }

    /// Builds an executable [`Job`] for `name`, carrying `parameters` over.
    ///
    /// # Errors
    ///
    /// Returns [`JobNotFound`] when the catalog has no entry for `name`.
    pub fn resolve(
        &self,
        name: &str,
        parameters: Option<Vec<String>>,
    ) -> Result<Job, JobNotFound> {
        let definition = self.get(name).ok_or_else(|| JobNotFound {
            name: name.to_owned(),
        })?;
        Ok(Job::new(
            name,
            definition.resource_specs.clone(),
            parameters,
        ))
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&JobDefinition> {
        self.definitions.get(name)
    }

    /// Job names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of defined jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` when no jobs are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
impl FromIterator<(String, JobDefinition)> for JobCatalog {
    fn from_iter<I: IntoIterator<Item = (String, JobDefinition)>>(iter: I) -> Self {
        Self {
            definitions: iter.into_iter().collect(),
        }
    }
}
