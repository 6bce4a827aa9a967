//! Cluster providers for the different local Kubernetes flavours
//!
//! The smoke test never creates or deletes clusters. A provider only answers
//! whether the target cluster is up before anything is mutated:
//! - Minikube (default): `minikube status`
//! - Kind: `kind get clusters`
//! - Existing: `kubectl cluster-info` against the target context

use crate::config::{ClusterProviderType, SmokeConfig};
use crate::runner::RunnerError;
use async_trait::async_trait;

mod existing;
mod kind;
mod minikube;

pub use existing::ExistingProvider;
pub use kind::KindProvider;
pub use minikube::MinikubeProvider;

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected status output: {0}")]
    BadStatus(String),
}

impl From<RunnerError> for ProviderError {
    fn from(err: RunnerError) -> Self {
        ProviderError::CommandFailed(err.to_string())
    }
}

/// Trait for cluster providers
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Check whether the named cluster is up and serving
    async fn is_running(&self, name: &str) -> Result<bool, ProviderError>;

    /// Provider name for display
    fn name(&self) -> &'static str;
}

/// Get the appropriate provider for the given config
pub fn get_provider(config: &SmokeConfig) -> Box<dyn ClusterProvider> {
    match config.provider {
        ClusterProviderType::Minikube => Box::new(MinikubeProvider::new()),
        ClusterProviderType::Kind => Box::new(KindProvider::new()),
        ClusterProviderType::Existing => Box::new(ExistingProvider::new(
            config.tools.kubectl.clone(),
            config.context.clone(),
        )),
    }
}
