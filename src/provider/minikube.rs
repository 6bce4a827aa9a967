//! Minikube cluster provider

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ClusterProvider, ProviderError};
use crate::runner;

/// Subset of `minikube status -o json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MinikubeStatus {
    host: String,
    #[serde(rename = "APIServer")]
    api_server: String,
}

impl MinikubeStatus {
    fn running(&self) -> bool {
        self.host == "Running" && self.api_server == "Running"
    }
}

/// Minikube cluster provider
pub struct MinikubeProvider {
    binary: String,
}

impl MinikubeProvider {
    pub fn new() -> Self {
        Self {
            binary: "minikube".to_string(),
        }
    }
}

impl Default for MinikubeProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpret `minikube status -o json` output
///
/// minikube exits non-zero whenever a component is stopped, so the exit code
/// alone is only trusted when stdout can't be parsed.
fn parse_status(stdout: &str, exit_code: i32) -> Result<bool, ProviderError> {
    match serde_json::from_str::<MinikubeStatus>(stdout.trim()) {
        Ok(status) => Ok(status.running()),
        Err(_) if exit_code != 0 => Ok(false),
        Err(e) => Err(ProviderError::BadStatus(e.to_string())),
    }
}

#[async_trait]
impl ClusterProvider for MinikubeProvider {
    #[instrument(skip(self), fields(provider = "minikube"))]
    async fn is_running(&self, name: &str) -> Result<bool, ProviderError> {
        let result = runner::run(&self.binary, &["status", "--profile", name, "-o", "json"]).await?;
        let running = parse_status(&result.stdout, result.exit_code)?;

        debug!(cluster = %name, running, "Checked minikube status");
        Ok(running)
    }

    fn name(&self) -> &'static str {
        "minikube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_running() {
        let stdout = r#"{"Name":"minikube","Host":"Running","Kubelet":"Running","APIServer":"Running","Kubeconfig":"Configured","Worker":false}"#;
        assert!(parse_status(stdout, 0).unwrap());
    }

    #[test]
    fn test_parse_status_stopped() {
        let stdout = r#"{"Name":"minikube","Host":"Stopped","Kubelet":"Stopped","APIServer":"Stopped","Kubeconfig":"Stopped","Worker":false}"#;
        assert!(!parse_status(stdout, 7).unwrap());
    }

    #[test]
    fn test_parse_status_missing_profile() {
        assert!(!parse_status("", 85).unwrap());
    }

    #[test]
    fn test_parse_status_garbage_with_success_is_error() {
        assert!(parse_status("not json", 0).is_err());
    }
}
