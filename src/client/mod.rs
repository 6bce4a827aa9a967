//! Capability interfaces over the external command line tools
//!
//! The orchestrator only talks to the cluster through these traits, so the
//! whole run can be driven against in-memory fakes. Each trait has one
//! CLI-backed implementation:
//! - [`ClusterClient`] -> [`Kubectl`]
//! - [`ManifestClient`] -> [`Kubecfg`]
//! - [`FunctionClient`] -> [`Kubeless`]

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

use crate::config::FunctionSpec;
use crate::runner::{RunResult, RunnerError};

mod kubecfg;
mod kubectl;
mod kubeless;

pub use kubecfg::Kubecfg;
pub use kubectl::Kubectl;
pub use kubeless::Kubeless;

/// Errors from collaborator commands
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("`{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("failed to read kubeconfig: {0}")]
    Kubeconfig(String),
}

impl ClientError {
    pub(crate) fn failed(command: impl Into<String>, result: &RunResult) -> Self {
        ClientError::CommandFailed {
            command: command.into(),
            reason: result.failure_reason(),
        }
    }
}

/// Cluster control-plane operations
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Name of the active kubeconfig context
    async fn current_context(&self) -> Result<String, ClientError>;

    /// Make `name` the active kubeconfig context
    async fn use_context(&self, name: &str) -> Result<(), ClientError>;

    /// Every context defined in the kubeconfig
    async fn contexts(&self) -> Result<Vec<String>, ClientError>;

    /// API group versions served by the cluster behind `context`
    async fn api_versions(&self, context: &str) -> Result<Vec<String>, ClientError>;

    /// Pods in `namespace` matching `selector`
    async fn pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClientError>;

    /// Last `tail` log lines of the pods matching `selector`
    async fn logs(&self, namespace: &str, selector: &str, tail: u32)
        -> Result<String, ClientError>;

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClientError>;

    async fn create_namespace(&self, namespace: &str) -> Result<(), ClientError>;

    /// Force-delete a namespace without waiting for it to go away
    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClientError>;

    /// Delete every resource matching `selector`
    async fn delete_all(&self, selector: &str) -> Result<(), ClientError>;
}

/// Declarative manifest application
#[async_trait]
pub trait ManifestClient: Send + Sync {
    async fn delete(&self, manifest: &Path) -> Result<(), ClientError>;

    /// Create or update every object in the manifest
    async fn update(&self, manifest: &Path) -> Result<(), ClientError>;
}

/// Function lifecycle operations
#[async_trait]
pub trait FunctionClient: Send + Sync {
    async fn deploy(&self, function: &FunctionSpec) -> Result<(), ClientError>;

    /// Invoke the function; the exit code is the observed result
    async fn call(&self, name: &str, data: &str) -> Result<RunResult, ClientError>;

    async fn delete(&self, name: &str) -> Result<(), ClientError>;
}
