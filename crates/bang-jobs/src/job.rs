//! Executable job descriptions.

/// A catalog entry bound to the parameters of one request.
///
/// Jobs are built by [`JobCatalog::resolve`](crate::JobCatalog::resolve) and
/// handed to a [`DeploymentEngine`](crate::DeploymentEngine). Resource specs
/// keep the order the catalog lists them in and parameters keep the order the
/// request supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    name: String,
    resource_specs: Vec<String>,
    parameters: Option<Vec<String>>,
}

impl Job {
    /// Creates a job from its parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        resource_specs: Vec<String>,
        parameters: Option<Vec<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_specs,
            parameters,
        }
    }

    /// Catalog name of the job.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deployment configuration references, in catalog order.
    #[must_use]
    pub fn resource_specs(&self) -> &[String] {
        &self.resource_specs
    }

    /// Request parameters, absent when the request carried none.
    #[must_use]
    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }
}
