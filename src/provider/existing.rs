//! Existing cluster provider
//!
//! Used for clusters not managed by a local tool: the cluster counts as
//! running when `kubectl cluster-info` succeeds against the target context.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ClusterProvider, ProviderError};
use crate::runner;

/// Existing cluster provider
pub struct ExistingProvider {
    kubectl: String,
    context: String,
}

impl ExistingProvider {
    #[must_use]
    pub fn new(kubectl: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            context: context.into(),
        }
    }
}

#[async_trait]
impl ClusterProvider for ExistingProvider {
    #[instrument(skip(self), fields(provider = "existing", context = %self.context))]
    async fn is_running(&self, name: &str) -> Result<bool, ProviderError> {
        let result = runner::run(
            &self.kubectl,
            &["--context", self.context.as_str(), "cluster-info"],
        )
        .await?;

        debug!(cluster = %name, running = result.passed(), "Checked cluster-info");
        Ok(result.passed())
    }

    fn name(&self) -> &'static str {
        "existing"
    }
}
