//! kubectl-backed cluster client

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::config::Kubeconfig;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ClientError, ClusterClient};
use crate::runner;

/// `kubectl get -o json` list wrapper; kubectl reports `kind: List`
#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

/// Cluster client shelling out to kubectl
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
}

impl Kubectl {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<runner::RunResult, ClientError> {
        Ok(runner::run(&self.binary, args).await?)
    }

    /// Run and require success, returning stdout
    async fn checked(&self, args: &[&str]) -> Result<String, ClientError> {
        let result = self.output(args).await?;
        if !result.passed() {
            return Err(ClientError::failed(
                format!("{} {}", self.binary, args.join(" ")),
                &result,
            ));
        }
        Ok(result.stdout)
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

fn parse_pods(stdout: &str) -> Result<Vec<Pod>, ClientError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<PodList>(stdout)
        .map(|list| list.items)
        .map_err(|e| ClientError::Parse {
            what: "pod list",
            reason: e.to_string(),
        })
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("NotFound") || stderr.contains("not found")
}

#[async_trait]
impl ClusterClient for Kubectl {
    async fn current_context(&self) -> Result<String, ClientError> {
        let stdout = self.checked(&["config", "current-context"]).await?;
        Ok(stdout.trim().to_string())
    }

    #[instrument(skip(self))]
    async fn use_context(&self, name: &str) -> Result<(), ClientError> {
        self.checked(&["config", "use-context", name]).await?;
        debug!(context = %name, "Switched kubeconfig context");
        Ok(())
    }

    async fn contexts(&self) -> Result<Vec<String>, ClientError> {
        // reading the kubeconfig is blocking file I/O
        let kubeconfig = tokio::task::spawn_blocking(Kubeconfig::read)
            .await
            .map_err(|e| ClientError::Kubeconfig(e.to_string()))?
            .map_err(|e| ClientError::Kubeconfig(e.to_string()))?;
        Ok(kubeconfig.contexts.into_iter().map(|c| c.name).collect())
    }

    async fn api_versions(&self, context: &str) -> Result<Vec<String>, ClientError> {
        let stdout = self.checked(&["--context", context, "api-versions"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClientError> {
        let ns = format!("--namespace={namespace}");
        let sel = format!("--selector={selector}");
        let stdout = self
            .checked(&["get", "pod", ns.as_str(), sel.as_str(), "-o", "json"])
            .await?;
        parse_pods(&stdout)
    }

    async fn logs(
        &self,
        namespace: &str,
        selector: &str,
        tail: u32,
    ) -> Result<String, ClientError> {
        let tail = format!("--tail={tail}");
        let ns = format!("--namespace={namespace}");
        let sel = format!("--selector={selector}");
        self.checked(&["logs", tail.as_str(), ns.as_str(), sel.as_str()])
            .await
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClientError> {
        let result = self
            .output(&["get", "namespace", namespace, "-o", "name"])
            .await?;

        if result.passed() {
            Ok(true)
        } else if is_not_found(&result.stderr) {
            Ok(false)
        } else {
            Err(ClientError::failed(
                format!("{} get namespace {namespace}", self.binary),
                &result,
            ))
        }
    }

    #[instrument(skip(self))]
    async fn create_namespace(&self, namespace: &str) -> Result<(), ClientError> {
        self.checked(&["create", "namespace", namespace]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClientError> {
        self.checked(&[
            "delete",
            "namespace",
            namespace,
            "--grace-period=0",
            "--force",
            "--wait=false",
        ])
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, selector: &str) -> Result<(), ClientError> {
        let sel = format!("--selector={selector}");
        self.checked(&["delete", "all", sel.as_str()]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::pod_is_running;

    #[test]
    fn test_parse_pods() {
        let stdout = r#"{
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"name": "kubeless-controller-7d9f", "namespace": "kubeless"},
                    "status": {"phase": "Running"}
                },
                {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"name": "kubeless-controller-x2c1", "namespace": "kubeless"},
                    "status": {"phase": "Pending"}
                }
            ]
        }"#;

        let pods = parse_pods(stdout).unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(
            pods[0].metadata.name.as_deref(),
            Some("kubeless-controller-7d9f")
        );
        assert!(pod_is_running(&pods[0]));
        assert!(!pod_is_running(&pods[1]));
    }

    #[test]
    fn test_parse_pods_empty_list() {
        let stdout = r#"{"apiVersion": "v1", "kind": "List", "items": []}"#;
        assert!(parse_pods(stdout).unwrap().is_empty());
        assert!(parse_pods("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_pods_garbage() {
        let err = parse_pods("No resources found").unwrap_err();
        assert!(matches!(err, ClientError::Parse { what: "pod list", .. }));
    }

    #[tokio::test]
    async fn test_contexts_read_from_kubeconfig() {
        let path = std::env::temp_dir().join(format!("rbac-smoke-kubeconfig-{}", std::process::id()));
        std::fs::write(
            &path,
            r#"apiVersion: v1
kind: Config
current-context: minikube
clusters: []
users: []
contexts:
- name: minikube
  context:
    cluster: minikube
    user: minikube
- name: kind-rbac
  context:
    cluster: kind-rbac
    user: kind-rbac
"#,
        )
        .unwrap();
        std::env::set_var("KUBECONFIG", &path);

        let contexts = Kubectl::default().contexts().await;
        std::fs::remove_file(&path).ok();

        assert_eq!(contexts.unwrap(), vec!["minikube", "kind-rbac"]);
    }

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found(
            r#"Error from server (NotFound): namespaces "kubeless" not found"#
        ));
        assert!(!is_not_found("Unable to connect to the server"));
    }
}
