//! Kind cluster provider

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ClusterProvider, ProviderError};
use crate::runner;

/// Kind cluster provider
pub struct KindProvider {
    binary: String,
}

impl KindProvider {
    pub fn new() -> Self {
        Self {
            binary: "kind".to_string(),
        }
    }
}

impl Default for KindProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lists_cluster(stdout: &str, name: &str) -> bool {
    stdout.lines().any(|line| line.trim() == name)
}

#[async_trait]
impl ClusterProvider for KindProvider {
    #[instrument(skip(self), fields(provider = "kind"))]
    async fn is_running(&self, name: &str) -> Result<bool, ProviderError> {
        let result = runner::run(&self.binary, &["get", "clusters"]).await?;

        if !result.passed() {
            return Err(ProviderError::CommandFailed(result.failure_reason()));
        }

        // kind names its kubeconfig contexts "kind-<cluster>"
        let cluster = name.strip_prefix("kind-").unwrap_or(name);
        let running = lists_cluster(&result.stdout, cluster);

        debug!(cluster = %cluster, running, "Checked kind clusters");
        Ok(running)
    }

    fn name(&self) -> &'static str {
        "kind"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_cluster() {
        let stdout = "kind\nrbac-test\n";
        assert!(lists_cluster(stdout, "rbac-test"));
        assert!(!lists_cluster(stdout, "rbac"));
    }

    #[test]
    fn test_lists_cluster_empty_output() {
        assert!(!lists_cluster("No kind clusters found.\n", "kind"));
    }
}
