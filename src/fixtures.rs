//! Test fixtures: pod builders and an in-memory cluster
//!
//! [`SimulatedCluster`] implements every collaborator trait over one shared
//! state, behaving like a kubeless installation on an RBAC-enforcing
//! cluster: deploying without the RBAC manifest makes the controller log a
//! denial and the function call fail, deploying with it brings the function
//! pod up. Every command is written to a journal so tests can assert on
//! what was issued.
//!
//! # Example
//!
//! ```
//! use rbac_smoke::fixtures::SimulatedCluster;
//! use rbac_smoke::SmokeConfig;
//!
//! let config = SmokeConfig::default();
//! let sim = SimulatedCluster::new(&config).current_context("docker-desktop");
//! let toolbox = sim.toolbox();
//! assert!(sim.journal().is_empty());
//! # drop(toolbox);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::client::{ClientError, ClusterClient, FunctionClient, ManifestClient};
use crate::config::{FunctionSpec, SmokeConfig};
use crate::provider::{ClusterProvider, ProviderError};
use crate::runner::RunResult;
use crate::smoke::Toolbox;

/// Builder for Pod resources with a given phase
#[derive(Clone)]
pub struct PodFixture {
    name: String,
    namespace: Option<String>,
    labels: BTreeMap<String, String>,
    phase: String,
}

impl PodFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            labels: BTreeMap::new(),
            phase: "Pending".to_string(),
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Add every `key=value` pair of a label selector
    pub fn selector_labels(mut self, selector: &str) -> Self {
        for pair in selector.split(',') {
            if let Some((key, value)) = pair.split_once('=') {
                self.labels.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        self
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.phase = phase.to_string();
        self
    }

    pub fn running(self) -> Self {
        self.phase("Running")
    }

    pub fn build(&self) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: self.namespace.clone(),
                labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(self.phase.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Create a pod fixture
pub fn pod(name: &str) -> PodFixture {
    PodFixture::new(name)
}

/// Mutable state behind a [`SimulatedCluster`]
#[derive(Debug)]
struct SimState {
    // what the config says the cluster looks like
    namespace: String,
    controller_selector: String,
    function: FunctionSpec,
    rbac_manifest: PathBuf,

    // knobs
    running: bool,
    contexts: Vec<String>,
    rbac_api: bool,
    rbac_enforced: bool,
    controller_starts: bool,
    function_pod_starts: bool,
    failing_contexts: Vec<String>,
    logs_hang: bool,

    // live cluster state
    current_context: Option<String>,
    namespace_present: bool,
    applied: Option<PathBuf>,
    function_deployed: bool,
    controller_log: Vec<String>,
    journal: Vec<String>,
}

impl SimState {
    fn rbac_granted(&self) -> bool {
        !self.rbac_enforced || self.applied.as_deref() == Some(self.rbac_manifest.as_path())
    }

    fn controller_running(&self) -> bool {
        self.namespace_present && self.applied.is_some() && self.controller_starts
    }

    fn function_running(&self) -> bool {
        self.function_deployed
            && self.rbac_granted()
            && self.controller_running()
            && self.function_pod_starts
    }

    fn record(&mut self, command: String) {
        self.journal.push(command);
    }
}

fn not_found(command: String, what: &str) -> ClientError {
    ClientError::CommandFailed {
        command,
        reason: format!("exit code 1: Error from server (NotFound): {what} not found"),
    }
}

/// In-memory kubeless-on-kubernetes used to drive the orchestrator in tests
#[derive(Clone)]
pub struct SimulatedCluster {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedCluster {
    /// A healthy cluster matching `config`, already on its target context
    pub fn new(config: &SmokeConfig) -> Self {
        let state = SimState {
            namespace: config.namespace.clone(),
            controller_selector: config.controller_selector.clone(),
            function: config.function.clone(),
            rbac_manifest: config.manifest_rbac.clone(),
            running: true,
            contexts: vec![config.context.clone()],
            rbac_api: true,
            rbac_enforced: true,
            controller_starts: true,
            function_pod_starts: true,
            failing_contexts: Vec::new(),
            logs_hang: false,
            current_context: Some(config.context.clone()),
            namespace_present: true,
            applied: None,
            function_deployed: false,
            controller_log: Vec::new(),
            journal: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // a panicking test must not hide the state from the next assertion
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `name` the active context (also added to the kubeconfig)
    pub fn current_context(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            if !state.contexts.iter().any(|c| c == name) {
                state.contexts.push(name.to_string());
            }
            state.current_context = Some(name.to_string());
        }
        self
    }

    /// Kubeconfig with no current-context set
    pub fn no_current_context(self) -> Self {
        self.lock().current_context = None;
        self
    }

    /// Remove `name` from the kubeconfig
    pub fn without_context(self, name: &str) -> Self {
        self.lock().contexts.retain(|c| c != name);
        self
    }

    /// Switching to `name` fails
    pub fn failing_switch_to(self, name: &str) -> Self {
        self.lock().failing_contexts.push(name.to_string());
        self
    }

    pub fn stopped(self) -> Self {
        self.lock().running = false;
        self
    }

    /// API server does not serve the RBAC group
    pub fn rbac_api_disabled(self) -> Self {
        self.lock().rbac_api = false;
        self
    }

    /// Controller may do anything regardless of the manifest
    pub fn rbac_not_enforced(self) -> Self {
        self.lock().rbac_enforced = false;
        self
    }

    /// Controller pods stay Pending forever
    pub fn controller_never_starts(self) -> Self {
        self.lock().controller_starts = false;
        self
    }

    /// Function pods stay Pending forever
    pub fn function_pod_never_starts(self) -> Self {
        self.lock().function_pod_starts = false;
        self
    }

    /// Log requests never return, like an unresponsive API server
    pub fn hanging_logs(self) -> Self {
        self.lock().logs_hang = true;
        self
    }

    /// Collaborators sharing this simulated cluster
    pub fn toolbox(&self) -> Toolbox {
        Toolbox {
            cluster: Box::new(self.clone()),
            manifests: Box::new(SimulatedManifests(self.clone())),
            functions: Box::new(SimulatedFunctions(self.clone())),
            provider: Box::new(SimulatedProvider(self.clone())),
        }
    }

    /// Every command issued so far, in order
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Commands containing `needle`
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    /// The active context right now
    pub fn active_context(&self) -> Option<String> {
        self.lock().current_context.clone()
    }
}

#[async_trait]
impl ClusterClient for SimulatedCluster {
    async fn current_context(&self) -> Result<String, ClientError> {
        let mut state = self.lock();
        state.record("kubectl config current-context".to_string());
        state.current_context.clone().ok_or_else(|| ClientError::CommandFailed {
            command: "kubectl config current-context".to_string(),
            reason: "exit code 1: error: current-context is not set".to_string(),
        })
    }

    async fn use_context(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        let command = format!("kubectl config use-context {name}");
        state.record(command.clone());

        if state.failing_contexts.iter().any(|c| c == name) || !state.contexts.iter().any(|c| c == name) {
            return Err(ClientError::CommandFailed {
                command,
                reason: format!("exit code 1: error: no context exists with the name: \"{name}\""),
            });
        }
        state.current_context = Some(name.to_string());
        Ok(())
    }

    async fn contexts(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.lock().contexts.clone())
    }

    async fn api_versions(&self, context: &str) -> Result<Vec<String>, ClientError> {
        let mut state = self.lock();
        state.record(format!("kubectl --context {context} api-versions"));

        let mut versions = vec!["apps/v1".to_string(), "v1".to_string()];
        if state.rbac_api {
            versions.push("rbac.authorization.k8s.io/v1".to_string());
        }
        Ok(versions)
    }

    async fn pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClientError> {
        let state = self.lock();

        if namespace == state.namespace && selector == state.controller_selector {
            if !state.namespace_present || state.applied.is_none() {
                return Ok(Vec::new());
            }
            let phase = if state.controller_running() { "Running" } else { "Pending" };
            return Ok(vec![pod("kubeless-controller-5c7b")
                .namespace(namespace)
                .selector_labels(selector)
                .phase(phase)
                .build()]);
        }

        if selector == state.function.selector() && state.function_deployed {
            let phase = if state.function_running() { "Running" } else { "Pending" };
            return Ok(vec![pod(&format!("{}-6f9d", state.function.name))
                .namespace(namespace)
                .selector_labels(selector)
                .phase(phase)
                .build()]);
        }

        Ok(Vec::new())
    }

    async fn logs(
        &self,
        namespace: &str,
        selector: &str,
        tail: u32,
    ) -> Result<String, ClientError> {
        let hang = self.lock().logs_hang;
        if hang {
            std::future::pending::<()>().await;
        }

        let state = self.lock();
        if namespace != state.namespace || selector != state.controller_selector {
            return Ok(String::new());
        }
        if !state.controller_running() {
            return Err(ClientError::CommandFailed {
                command: format!("kubectl logs --tail={tail} --namespace={namespace} --selector={selector}"),
                reason: "exit code 1: error: no pods running".to_string(),
            });
        }

        let skip = state.controller_log.len().saturating_sub(tail as usize);
        Ok(state.controller_log[skip..].join("\n"))
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClientError> {
        let state = self.lock();
        Ok(namespace == state.namespace && state.namespace_present)
    }

    async fn create_namespace(&self, namespace: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        let command = format!("kubectl create namespace {namespace}");
        state.record(command.clone());

        if namespace == state.namespace {
            if state.namespace_present {
                return Err(ClientError::CommandFailed {
                    command,
                    reason: "exit code 1: namespace already exists".to_string(),
                });
            }
            state.namespace_present = true;
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        let command = format!("kubectl delete namespace {namespace}");
        state.record(command.clone());

        if namespace != state.namespace || !state.namespace_present {
            return Err(not_found(command, "namespace"));
        }
        state.namespace_present = false;
        state.applied = None;
        state.controller_log.clear();
        Ok(())
    }

    async fn delete_all(&self, selector: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.record(format!("kubectl delete all --selector={selector}"));
        if selector == state.function.selector() {
            state.function_deployed = false;
        }
        Ok(())
    }
}

/// Manifest tool over a [`SimulatedCluster`]
pub struct SimulatedManifests(SimulatedCluster);

#[async_trait]
impl ManifestClient for SimulatedManifests {
    async fn delete(&self, manifest: &Path) -> Result<(), ClientError> {
        let mut state = self.0.lock();
        let command = format!("kubecfg delete {}", manifest.display());
        state.record(command.clone());

        if state.applied.as_deref() != Some(manifest) {
            return Err(not_found(command, "manifest objects"));
        }
        state.applied = None;
        state.controller_log.clear();
        Ok(())
    }

    async fn update(&self, manifest: &Path) -> Result<(), ClientError> {
        let mut state = self.0.lock();
        let command = format!("kubecfg update {}", manifest.display());
        state.record(command.clone());

        if !state.namespace_present {
            return Err(not_found(command, "namespace"));
        }
        state.applied = Some(manifest.to_path_buf());
        state.controller_log.push("Starting kubeless controller".to_string());
        if state.rbac_granted() {
            state
                .controller_log
                .push("Kubeless controller synced and ready".to_string());
        }
        Ok(())
    }
}

/// Function CLI over a [`SimulatedCluster`]
pub struct SimulatedFunctions(SimulatedCluster);

#[async_trait]
impl FunctionClient for SimulatedFunctions {
    async fn deploy(&self, function: &FunctionSpec) -> Result<(), ClientError> {
        let mut state = self.0.lock();
        state.record(format!("kubeless function deploy {}", function.name));

        state.function_deployed = true;
        if !state.rbac_granted() {
            let line = format!(
                "Error processing default/{}: User \"system:serviceaccount:{}:controller-acct\" \
                 cannot create deployments.extensions in the namespace \"default\"",
                function.name, state.namespace
            );
            state.controller_log.push(line);
        }
        Ok(())
    }

    async fn call(&self, name: &str, data: &str) -> Result<RunResult, ClientError> {
        let mut state = self.0.lock();
        state.record(format!("kubeless function call {name} --data {data}"));

        if name == state.function.name && state.function_running() {
            Ok(RunResult {
                exit_code: 0,
                stdout: "hello world".to_string(),
                stderr: String::new(),
            })
        } else {
            Ok(RunResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: "FATA[0000] the server could not find the requested resource".to_string(),
            })
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.0.lock();
        let command = format!("kubeless function delete {name}");
        state.record(command.clone());

        if name != state.function.name || !state.function_deployed {
            return Err(not_found(command, "function"));
        }
        state.function_deployed = false;
        Ok(())
    }
}

/// Cluster provider over a [`SimulatedCluster`]
pub struct SimulatedProvider(SimulatedCluster);

#[async_trait]
impl ClusterProvider for SimulatedProvider {
    async fn is_running(&self, _name: &str) -> Result<bool, ProviderError> {
        Ok(self.0.lock().running)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::pod_is_running;

    #[test]
    fn test_pod_fixture() {
        let pod = pod("ctrl")
            .namespace("kubeless")
            .selector_labels("kubeless=controller, tier=core")
            .running()
            .build();

        assert_eq!(pod.metadata.name.as_deref(), Some("ctrl"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("kubeless"));
        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels.get("kubeless").map(String::as_str), Some("controller"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("core"));
        assert_eq!(pod.status.unwrap().phase.as_deref(), Some("Running"));
    }

    #[test]
    fn test_pod_fixture_defaults_to_pending() {
        let pod = PodFixture::new("p").label("app", "x").build();
        assert!(!pod_is_running(&pod));
    }

    #[tokio::test]
    async fn test_simulated_denial_without_rbac_manifest() {
        let config = SmokeConfig::default();
        let sim = SimulatedCluster::new(&config);
        let toolbox = sim.toolbox();

        toolbox.cluster.delete_namespace("kubeless").await.unwrap();
        toolbox.cluster.create_namespace("kubeless").await.unwrap();
        toolbox.manifests.update(&config.manifest).await.unwrap();
        toolbox.functions.deploy(&config.function).await.unwrap();

        let logs = toolbox
            .cluster
            .logs("kubeless", "kubeless=controller", 10)
            .await
            .unwrap();
        assert!(logs.contains("User \"system:serviceaccount:kubeless:controller-acct\" cannot"));

        let call = toolbox.functions.call("get-python", "{}").await.unwrap();
        assert_eq!(call.exit_code, 1);
    }

    #[tokio::test]
    async fn test_simulated_success_with_rbac_manifest() {
        let config = SmokeConfig::default();
        let sim = SimulatedCluster::new(&config);
        let toolbox = sim.toolbox();

        toolbox.cluster.delete_namespace("kubeless").await.unwrap();
        toolbox.cluster.create_namespace("kubeless").await.unwrap();
        toolbox.manifests.update(&config.manifest_rbac).await.unwrap();
        toolbox.functions.deploy(&config.function).await.unwrap();

        let pods = toolbox.cluster.pods("default", "function=get-python").await.unwrap();
        assert!(pods.iter().any(pod_is_running));

        let call = toolbox.functions.call("get-python", "{}").await.unwrap();
        assert_eq!(call.exit_code, 0);
        assert_eq!(sim.commands_matching("kubecfg update").len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_logs_respect_tail() {
        let config = SmokeConfig::default();
        let sim = SimulatedCluster::new(&config);
        let toolbox = sim.toolbox();

        toolbox.manifests.update(&config.manifest_rbac).await.unwrap();
        let logs = toolbox
            .cluster
            .logs("kubeless", "kubeless=controller", 1)
            .await
            .unwrap();
        assert_eq!(logs, "Kubeless controller synced and ready");
    }
}
