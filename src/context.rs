//! Kubeconfig context preservation
//!
//! The active context is global state shared with every other tool on the
//! machine. [`switch_to`] remembers what was active before the run and
//! [`SavedContext::restore`] puts it back afterwards. When the target
//! context is already active neither call issues a command.

use tracing::{debug, info, warn};

use crate::client::{ClientError, ClusterClient};

/// Context that was active before the run switched away from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedContext {
    previous: Option<String>,
}

impl SavedContext {
    /// Nothing to restore
    pub fn none() -> Self {
        Self { previous: None }
    }

    /// Context that will be restored, if any
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Switch back to the saved context
    ///
    /// Returns whether a switch command was issued.
    pub async fn restore(self, cluster: &dyn ClusterClient) -> Result<bool, ClientError> {
        match self.previous {
            Some(previous) => {
                cluster.use_context(&previous).await?;
                info!(context = %previous, "Restored kubeconfig context");
                Ok(true)
            }
            None => {
                debug!("No kubeconfig context to restore");
                Ok(false)
            }
        }
    }
}

/// Make `target` the active context, remembering the current one
pub async fn switch_to(
    cluster: &dyn ClusterClient,
    target: &str,
) -> Result<SavedContext, ClientError> {
    let current = match cluster.current_context().await {
        Ok(current) => Some(current),
        Err(e) => {
            // kubectl fails when no current-context is set
            warn!(error = %e, "Could not read current kubeconfig context");
            None
        }
    };

    if current.as_deref() == Some(target) {
        debug!(context = %target, "Already on target context");
        return Ok(SavedContext::none());
    }

    cluster.use_context(target).await?;
    info!(
        context = %target,
        previous = current.as_deref().unwrap_or("<none>"),
        "Switched kubeconfig context"
    );

    Ok(SavedContext { previous: current })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmokeConfig;
    use crate::fixtures::SimulatedCluster;

    #[tokio::test]
    async fn test_switch_and_restore() {
        let config = SmokeConfig::new("minikube");
        let sim = SimulatedCluster::new(&config).current_context("docker-desktop");

        let saved = switch_to(&sim, "minikube").await.unwrap();
        assert_eq!(saved.previous(), Some("docker-desktop"));
        assert_eq!(sim.active_context().as_deref(), Some("minikube"));

        assert!(saved.restore(&sim).await.unwrap());
        assert_eq!(sim.active_context().as_deref(), Some("docker-desktop"));
        assert_eq!(
            sim.commands_matching("use-context"),
            vec![
                "kubectl config use-context minikube",
                "kubectl config use-context docker-desktop",
            ]
        );
    }

    #[tokio::test]
    async fn test_already_on_target_issues_no_switch() {
        let config = SmokeConfig::new("minikube");
        let sim = SimulatedCluster::new(&config);

        let saved = switch_to(&sim, "minikube").await.unwrap();
        assert_eq!(saved, SavedContext::none());
        assert!(!saved.restore(&sim).await.unwrap());
        assert!(sim.commands_matching("use-context").is_empty());
    }

    #[tokio::test]
    async fn test_unset_current_context_is_not_restored() {
        let config = SmokeConfig::new("minikube");
        let sim = SimulatedCluster::new(&config).no_current_context();

        let saved = switch_to(&sim, "minikube").await.unwrap();
        assert_eq!(saved.previous(), None);
        assert!(!saved.restore(&sim).await.unwrap());
        assert_eq!(sim.commands_matching("use-context").len(), 1);
    }

    #[tokio::test]
    async fn test_switch_failure_is_reported() {
        let config = SmokeConfig::new("minikube");
        let sim = SimulatedCluster::new(&config)
            .current_context("docker-desktop")
            .failing_switch_to("minikube");

        assert!(switch_to(&sim, "minikube").await.is_err());
        assert_eq!(sim.active_context().as_deref(), Some("docker-desktop"));
    }
}
