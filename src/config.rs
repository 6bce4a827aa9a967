//! Configuration types for the RBAC smoke test
//!
//! Everything is built programmatically with sensible defaults for a
//! minikube cluster running kubeless. `SmokeConfig::from_env` layers a few
//! environment overrides on top - there are no config files.
//!
//! # Example
//!
//! ```
//! use rbac_smoke::config::{ClusterProviderType, FunctionSpec, SmokeConfig};
//!
//! let config = SmokeConfig::new("kind-rbac")
//!     .provider(ClusterProviderType::Kind)
//!     .namespace("kubeless")
//!     .function(FunctionSpec::new("get-python").runtime("python3.7"));
//!
//! assert_eq!(config.context, "kind-rbac");
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Error type for configuration problems
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown cluster provider '{0}' (expected minikube, kind or existing)")]
    UnknownProvider(String),

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("invalid log pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },
}

/// Cluster provider type
///
/// Only used to answer "is the target cluster running" during preflight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClusterProviderType {
    #[default]
    Minikube,
    Kind,
    Existing,
}

impl ClusterProviderType {
    /// Binary the provider shells out to, if any beyond kubectl
    pub fn binary(&self) -> Option<&'static str> {
        match self {
            Self::Minikube => Some("minikube"),
            Self::Kind => Some("kind"),
            Self::Existing => None,
        }
    }
}

impl FromStr for ClusterProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minikube" => Ok(Self::Minikube),
            "kind" => Ok(Self::Kind),
            "existing" => Ok(Self::Existing),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Which controller manifest to (re)apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestVariant {
    /// Baseline manifest without the permissive RBAC bindings
    WithoutRbac,
    /// Manifest including the RBAC roles and bindings
    WithRbac,
}

impl ManifestVariant {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WithoutRbac => "without RBAC roles",
            Self::WithRbac => "with RBAC roles",
        }
    }
}

/// Locations of the external command line tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Cluster control-plane client
    pub kubectl: String,
    /// Manifest apply tool
    pub kubecfg: String,
    /// Function management CLI
    pub kubeless: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            kubecfg: "kubecfg".to_string(),
            kubeless: "kubeless".to_string(),
        }
    }
}

impl ToolPaths {
    /// Set kubectl binary
    pub fn kubectl(mut self, path: impl Into<String>) -> Self {
        self.kubectl = path.into();
        self
    }

    /// Set kubecfg binary
    pub fn kubecfg(mut self, path: impl Into<String>) -> Self {
        self.kubecfg = path.into();
        self
    }

    /// Set kubeless binary
    pub fn kubeless(mut self, path: impl Into<String>) -> Self {
        self.kubeless = path.into();
        self
    }
}

/// The function deployed and invoked by both scenarios
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    pub from_file: PathBuf,
    /// JSON payload passed to `function call`
    pub data: String,
}

impl FunctionSpec {
    /// Create a function spec with the default python hello-world handler
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime: "python2.7".to_string(),
            handler: "helloget.foo".to_string(),
            from_file: PathBuf::from("python/helloget.py"),
            data: r#"{"hello": "world"}"#.to_string(),
        }
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.from_file = path.into();
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Label selector matching the function's own pods
    pub fn selector(&self) -> String {
        format!("function={}", self.name)
    }
}

impl Default for FunctionSpec {
    fn default() -> Self {
        Self::new("get-python")
    }
}

/// Polling behaviour for every wait in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two probes
    pub interval: Duration,
    /// Deadline for the controller namespace to disappear
    pub namespace_deleted: Duration,
    /// Deadline for a controller pod to reach Running
    pub controller_ready: Duration,
    /// Deadline for the expected controller log line
    pub log_line: Duration,
    /// Deadline for the function pod to reach Running
    pub function_ready: Duration,
    /// Pause after the controller is Running before deploying
    pub settle: Duration,
    /// Give up a wait after this many probes, deadline or not
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            namespace_deleted: Duration::from_secs(180),
            controller_ready: Duration::from_secs(300),
            log_line: Duration::from_secs(120),
            function_ready: Duration::from_secs(300),
            settle: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Use the same deadline for every wait
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.namespace_deleted = timeout;
        self.controller_ready = timeout;
        self.log_line = timeout;
        self.function_ready = timeout;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Cap the number of probes of every wait
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Full smoke test configuration
#[derive(Debug, Clone)]
pub struct SmokeConfig {
    /// Kubeconfig context the tests must run against
    pub context: String,

    /// How to check that the cluster is up
    pub provider: ClusterProviderType,

    /// Cluster name passed to the provider (minikube profile, kind cluster)
    pub cluster_name: String,

    /// Namespace the controller lives in
    pub namespace: String,

    /// Label selector of the controller pod
    pub controller_selector: String,

    /// Manifest without the RBAC bindings
    pub manifest: PathBuf,

    /// Manifest with the RBAC bindings
    pub manifest_rbac: PathBuf,

    /// Number of controller log lines inspected per probe
    pub log_tail: u32,

    /// Log line proving the controller was denied by RBAC
    pub denied_pattern: String,

    /// Log line proving the controller is able to work
    pub ready_pattern: String,

    pub tools: ToolPaths,

    pub function: FunctionSpec,

    pub poll: PollConfig,
}

impl SmokeConfig {
    /// Create a config targeting the given kubeconfig context
    pub fn new(context: impl Into<String>) -> Self {
        let context = context.into();
        Self {
            cluster_name: context.clone(),
            context,
            provider: ClusterProviderType::default(),
            namespace: "kubeless".to_string(),
            controller_selector: "kubeless=controller".to_string(),
            manifest: PathBuf::from("kubeless.jsonnet"),
            manifest_rbac: PathBuf::from("kubeless-rbac.jsonnet"),
            log_tail: 10,
            denied_pattern: "User.*cannot".to_string(),
            ready_pattern: "controller synced and ready".to_string(),
            tools: ToolPaths::default(),
            function: FunctionSpec::default(),
            poll: PollConfig::default(),
        }
    }

    /// Build the default config and apply environment overrides
    ///
    /// Recognised variables: `RBAC_SMOKE_CONTEXT`, `RBAC_SMOKE_PROVIDER`,
    /// `RBAC_SMOKE_CLUSTER`, `RBAC_SMOKE_NAMESPACE`, `RBAC_SMOKE_MANIFEST`,
    /// `RBAC_SMOKE_MANIFEST_RBAC`, `KUBECTL`, `KUBECFG` and `KUBELESS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SmokeConfig::from_env`] with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let context = get("RBAC_SMOKE_CONTEXT").unwrap_or_else(|| "minikube".to_string());
        let mut config = Self::new(context);

        if let Some(provider) = get("RBAC_SMOKE_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Some(cluster) = get("RBAC_SMOKE_CLUSTER") {
            config.cluster_name = cluster;
        }
        if let Some(ns) = get("RBAC_SMOKE_NAMESPACE") {
            config.namespace = ns;
        }
        if let Some(path) = get("RBAC_SMOKE_MANIFEST") {
            config.manifest = PathBuf::from(path);
        }
        if let Some(path) = get("RBAC_SMOKE_MANIFEST_RBAC") {
            config.manifest_rbac = PathBuf::from(path);
        }
        if let Some(bin) = get("KUBECTL") {
            config.tools.kubectl = bin;
        }
        if let Some(bin) = get("KUBECFG") {
            config.tools.kubecfg = bin;
        }
        if let Some(bin) = get("KUBELESS") {
            config.tools.kubeless = bin;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would produce meaningless commands
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("context", self.context.as_str()),
            ("namespace", self.namespace.as_str()),
            ("controller selector", self.controller_selector.as_str()),
            ("function name", self.function.name.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { name });
            }
        }
        Ok(())
    }

    /// Set cluster provider
    pub fn provider(mut self, provider: ClusterProviderType) -> Self {
        self.provider = provider;
        self
    }

    /// Set cluster name used by the provider
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// Set controller namespace
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set controller label selector
    pub fn controller_selector(mut self, selector: impl Into<String>) -> Self {
        self.controller_selector = selector.into();
        self
    }

    /// Set both manifest variants
    pub fn manifests(mut self, plain: impl Into<PathBuf>, rbac: impl Into<PathBuf>) -> Self {
        self.manifest = plain.into();
        self.manifest_rbac = rbac.into();
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn function(mut self, function: FunctionSpec) -> Self {
        self.function = function;
        self
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Manifest file for the given variant
    pub fn manifest_for(&self, variant: ManifestVariant) -> &PathBuf {
        match variant {
            ManifestVariant::WithoutRbac => &self.manifest,
            ManifestVariant::WithRbac => &self.manifest_rbac,
        }
    }

    /// Every binary that must resolve before the run starts
    pub fn required_tools(&self) -> Vec<String> {
        let mut tools = vec![
            self.tools.kubectl.clone(),
            self.tools.kubecfg.clone(),
            self.tools.kubeless.clone(),
        ];
        if let Some(bin) = self.provider.binary() {
            tools.push(bin.to_string());
        }
        tools
    }
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self::new("minikube")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SmokeConfig::default();

        assert_eq!(config.context, "minikube");
        assert_eq!(config.cluster_name, "minikube");
        assert_eq!(config.provider, ClusterProviderType::Minikube);
        assert_eq!(config.namespace, "kubeless");
        assert_eq!(config.controller_selector, "kubeless=controller");
        assert_eq!(config.log_tail, 10);
        assert_eq!(config.poll.settle, Duration::from_secs(10));
        assert_eq!(config.poll.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_manifest_for_variant() {
        let config = SmokeConfig::default().manifests("plain.jsonnet", "rbac.jsonnet");

        assert_eq!(
            config.manifest_for(ManifestVariant::WithoutRbac),
            &PathBuf::from("plain.jsonnet")
        );
        assert_eq!(
            config.manifest_for(ManifestVariant::WithRbac),
            &PathBuf::from("rbac.jsonnet")
        );
    }

    #[test]
    fn test_required_tools_include_provider_binary() {
        let config = SmokeConfig::default();
        assert_eq!(
            config.required_tools(),
            vec!["kubectl", "kubecfg", "kubeless", "minikube"]
        );

        let config = SmokeConfig::default().provider(ClusterProviderType::Existing);
        assert_eq!(config.required_tools(), vec!["kubectl", "kubecfg", "kubeless"]);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("kind".parse::<ClusterProviderType>().unwrap(), ClusterProviderType::Kind);
        assert_eq!(
            " Existing ".parse::<ClusterProviderType>().unwrap(),
            ClusterProviderType::Existing
        );
        let err = "k3d".parse::<ClusterProviderType>().unwrap_err();
        assert!(err.to_string().contains("k3d"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RBAC_SMOKE_CONTEXT", "kind-rbac"),
            ("RBAC_SMOKE_PROVIDER", "kind"),
            ("RBAC_SMOKE_CLUSTER", "rbac"),
            ("KUBECTL", "/opt/bin/kubectl"),
            ("KUBELESS", ""),
        ]
        .into_iter()
        .collect();

        let config =
            SmokeConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.context, "kind-rbac");
        assert_eq!(config.cluster_name, "rbac");
        assert_eq!(config.provider, ClusterProviderType::Kind);
        assert_eq!(config.tools.kubectl, "/opt/bin/kubectl");
        // empty values fall back to defaults
        assert_eq!(config.tools.kubeless, "kubeless");
    }

    #[test]
    fn test_from_lookup_rejects_unknown_provider() {
        let result = SmokeConfig::from_lookup(|key| {
            (key == "RBAC_SMOKE_PROVIDER").then(|| "docker-desktop".to_string())
        });
        assert!(matches!(result, Err(ConfigError::UnknownProvider(_))));
    }

    #[test]
    fn test_validate_rejects_empty_selector() {
        let config = SmokeConfig::default().controller_selector(" ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("controller selector"));
    }

    #[test]
    fn test_function_spec_builder() {
        let function = FunctionSpec::new("hello")
            .runtime("python3.7")
            .handler("hello.handler")
            .from_file("fn/hello.py")
            .data("{}");

        assert_eq!(function.name, "hello");
        assert_eq!(function.runtime, "python3.7");
        assert_eq!(function.handler, "hello.handler");
        assert_eq!(function.from_file, PathBuf::from("fn/hello.py"));
        assert_eq!(function.selector(), "function=hello");
    }

    #[test]
    fn test_poll_timeout_applies_to_every_wait() {
        let poll = PollConfig::default().timeout(Duration::from_secs(5));
        assert_eq!(poll.namespace_deleted, Duration::from_secs(5));
        assert_eq!(poll.controller_ready, Duration::from_secs(5));
        assert_eq!(poll.log_line, Duration::from_secs(5));
        assert_eq!(poll.function_ready, Duration::from_secs(5));
        assert_eq!(poll.max_attempts, None);
        assert_eq!(poll.max_attempts(4).max_attempts, Some(4));
    }
}
