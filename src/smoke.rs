//! The smoke test orchestrator
//!
//! [`SmokeTest`] owns the configuration, the collaborator clients and the
//! pass/fail tally, and runs the whole sequence:
//!
//! 1. preflight checks (fatal, exit code 255)
//! 2. switch to the target kubeconfig context
//! 3. every [`Scenario`] in order; assertion failures never stop the run
//! 4. restore the previous context
//!
//! # Example
//!
//! ```no_run
//! use rbac_smoke::{SmokeConfig, SmokeTest, Toolbox};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SmokeConfig::from_env()?;
//!     let toolbox = Toolbox::from_config(&config);
//!     let summary = SmokeTest::new(config, toolbox)?.run().await?;
//!     println!("{} failed", summary.failed);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use crate::assertions::Tally;
use crate::client::{
    ClientError, ClusterClient, FunctionClient, Kubecfg, Kubectl, Kubeless, ManifestClient,
};
use crate::config::{ConfigError, ManifestVariant, SmokeConfig};
use crate::context;
use crate::eventually::{eventually, Eventually};
use crate::preflight::{self, PreflightError};
use crate::provider::{get_provider, ClusterProvider};
use crate::scenario::{LogExpectation, Scenario};
use crate::wait::{pod_is_running, ResourceState, WaitError};

/// Exit code reserved for unmet prerequisites
pub const PREFLIGHT_EXIT_CODE: u8 = 255;

/// Highest exit code used to report assertion failures
pub const MAX_FAILURE_EXIT_CODE: u8 = 254;

/// kubeless deploys functions into the context's default namespace
const FUNCTION_NAMESPACE: &str = "default";

/// The external collaborators the orchestrator drives
pub struct Toolbox {
    pub cluster: Box<dyn ClusterClient>,
    pub manifests: Box<dyn ManifestClient>,
    pub functions: Box<dyn FunctionClient>,
    pub provider: Box<dyn ClusterProvider>,
}

impl Toolbox {
    /// CLI-backed collaborators for a real cluster
    pub fn from_config(config: &SmokeConfig) -> Self {
        Self {
            cluster: Box::new(Kubectl::new(config.tools.kubectl.clone())),
            manifests: Box::new(Kubecfg::new(config.tools.kubecfg.clone())),
            functions: Box::new(Kubeless::new(config.tools.kubeless.clone())),
            provider: get_provider(config),
        }
    }
}

/// Errors that abort the run before any scenario executes
#[derive(Debug, thiserror::Error)]
pub enum SmokeError {
    #[error("preflight check failed: {0}")]
    Preflight(#[from] PreflightError),

    #[error("failed to switch to context {context}: {source}")]
    SwitchContext {
        context: String,
        #[source]
        source: ClientError,
    },
}

impl SmokeError {
    pub fn exit_code(&self) -> u8 {
        PREFLIGHT_EXIT_CODE
    }
}

/// Why a scenario stopped before reaching its assertions
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("{step}: {source}")]
    Client {
        step: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("{0}")]
    Wait(#[from] WaitError),
}

impl StepError {
    fn client(step: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| StepError::Client { step, source }
    }
}

/// Outcome of a complete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: u32,
    pub failed: u32,
    /// False when switching back to the previous context failed
    pub context_restored: bool,
}

impl RunSummary {
    /// Number of assertions executed
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    /// Process exit code: the failure count, clamped below the preflight code
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.failed)
            .unwrap_or(MAX_FAILURE_EXIT_CODE)
            .min(MAX_FAILURE_EXIT_CODE)
    }
}

/// Orchestrator state for one run
pub struct SmokeTest {
    config: SmokeConfig,
    toolbox: Toolbox,
    tally: Tally,
    denied: Regex,
    ready: Regex,
}

impl SmokeTest {
    /// Validate the config and compile its log patterns
    pub fn new(config: SmokeConfig, toolbox: Toolbox) -> Result<Self, ConfigError> {
        config.validate()?;
        let denied = compile(&config.denied_pattern)?;
        let ready = compile(&config.ready_pattern)?;

        Ok(Self {
            config,
            toolbox,
            tally: Tally::new(),
            denied,
            ready,
        })
    }

    /// Replace the tally (e.g. to disable terminal highlighting)
    pub fn with_tally(mut self, tally: Tally) -> Self {
        self.tally = tally;
        self
    }

    pub fn config(&self) -> &SmokeConfig {
        &self.config
    }

    /// Run the whole smoke test
    pub async fn run(mut self) -> Result<RunSummary, SmokeError> {
        let cluster = self.toolbox.cluster.as_ref();

        preflight::verify(&self.config, self.toolbox.provider.as_ref(), cluster).await?;

        let saved = context::switch_to(cluster, &self.config.context)
            .await
            .map_err(|source| SmokeError::SwitchContext {
                context: self.config.context.clone(),
                source,
            })?;

        for scenario in Scenario::all() {
            self.run_scenario(&scenario).await;
        }

        let previous = saved.previous().map(str::to_string);
        let context_restored = match saved.restore(self.toolbox.cluster.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    context = previous.as_deref().unwrap_or_default(),
                    error = %e,
                    "Failed to restore kubeconfig context"
                );
                false
            }
        };

        println!("{}", self.tally.summary());

        Ok(RunSummary {
            passed: self.tally.passed(),
            failed: self.tally.failed(),
            context_restored,
        })
    }

    /// Run and map the outcome to a process exit code
    pub async fn run_to_exit_code(self) -> u8 {
        match self.run().await {
            Ok(summary) => summary.exit_code(),
            Err(e) => {
                error!(error = %e, "Smoke test aborted");
                eprintln!("ERROR: {e}");
                e.exit_code()
            }
        }
    }

    #[instrument(skip_all, fields(scenario = %scenario.name))]
    async fn run_scenario(&mut self, scenario: &Scenario) {
        info!("Running scenario");

        if let Err(e) = self.prepare(scenario).await {
            error!(error = %e, "Scenario setup failed");
            self.tally.fail(&scenario.describe("scenario setup"));
            return;
        }

        let pattern = match scenario.log {
            LogExpectation::Denied => &self.denied,
            LogExpectation::Ready => &self.ready,
        };
        let observed = match self.wait_for_log_line(pattern).await {
            Ok(()) => 0,
            Err(e) => {
                warn!(error = %e, "Expected controller log line never appeared");
                1
            }
        };
        self.tally.check(&scenario.log_description(), observed, 0);

        if scenario.wait_for_function_pod {
            let selector = self.config.function.selector();
            if let Err(e) = self
                .wait_for_running_pod(FUNCTION_NAMESPACE, &selector, self.config.poll.function_ready)
                .await
            {
                error!(error = %e, "Function pod never became ready");
                self.tally.fail(&scenario.describe("function pod running"));
                return;
            }
        }

        let function = &self.config.function;
        let observed = match self.toolbox.functions.call(&function.name, &function.data).await {
            Ok(result) => result.exit_code,
            Err(e) => {
                error!(error = %e, "Function call could not be issued");
                -1
            }
        };
        self.tally
            .check(&scenario.call_description(), observed, scenario.expected_call);
    }

    /// Everything up to and including the function deploy
    async fn prepare(&self, scenario: &Scenario) -> Result<(), StepError> {
        self.remove_function().await;
        self.redeploy_controller(scenario.manifest).await?;

        self.wait_for_running_pod(
            &self.config.namespace,
            &self.config.controller_selector,
            self.config.poll.controller_ready,
        )
        .await?;
        debug!(settle = ?self.config.poll.settle, "Controller running, settling");
        tokio::time::sleep(self.config.poll.settle).await;

        // The API accepts the deploy either way; RBAC only bites inside the controller
        if let Err(e) = self.toolbox.functions.deploy(&self.config.function).await {
            warn!(error = %e, "Function deploy command failed");
        }
        Ok(())
    }

    /// Best-effort removal of the function and everything it created
    async fn remove_function(&self) {
        let function = &self.config.function;

        if let Err(e) = self.toolbox.functions.delete(&function.name).await {
            debug!(error = %e, "Function delete failed (ignored)");
        }
        if let Err(e) = self.toolbox.cluster.delete_all(&function.selector()).await {
            debug!(error = %e, "Function resource cleanup failed (ignored)");
        }
    }

    /// Tear down the controller namespace and apply a manifest variant
    #[instrument(skip(self))]
    async fn redeploy_controller(&self, variant: ManifestVariant) -> Result<(), StepError> {
        let manifest = self.config.manifest_for(variant);
        let namespace = &self.config.namespace;
        let cluster = self.toolbox.cluster.as_ref();

        if let Err(e) = self.toolbox.manifests.delete(manifest).await {
            debug!(error = %e, "Manifest delete failed (ignored)");
        }
        if let Err(e) = cluster.delete_namespace(namespace).await {
            debug!(error = %e, "Namespace delete failed (ignored)");
        }

        self.wait_for_namespace_gone().await?;

        cluster
            .create_namespace(namespace)
            .await
            .map_err(StepError::client("create namespace"))?;
        self.toolbox
            .manifests
            .update(manifest)
            .await
            .map_err(StepError::client("apply manifest"))?;

        info!(manifest = %manifest.display(), "Controller manifest applied");
        Ok(())
    }

    /// Apply the configured poll interval and attempt cap to a wait
    fn poll<F, Fut>(&self, check: Eventually<F, Fut>, timeout: Duration) -> Eventually<F, Fut>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        let check = check.interval(self.config.poll.interval).timeout(timeout);
        match self.config.poll.max_attempts {
            Some(attempts) => check.max_attempts(attempts),
            None => check,
        }
    }

    async fn wait_for_namespace_gone(&self) -> Result<(), WaitError> {
        let cluster = self.toolbox.cluster.as_ref();
        let namespace = self.config.namespace.as_str();
        let timeout = self.config.poll.namespace_deleted;

        let probe = eventually(move || async move {
            match cluster.namespace_exists(namespace).await {
                Ok(exists) => !exists,
                Err(e) => {
                    debug!(error = %e, "Namespace lookup failed, retrying");
                    false
                }
            }
        });

        self.poll(probe, timeout)
            .await_condition()
            .await
            .map_err(|e| {
                WaitError::new(format!("namespace {namespace} deleted"), timeout, e.elapsed())
                    .with_state("namespace still present")
            })
    }

    async fn wait_for_running_pod(
        &self,
        namespace: &str,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let cluster = self.toolbox.cluster.as_ref();

        let probe = eventually(move || async move {
            match cluster.pods(namespace, selector).await {
                Ok(pods) => pods.iter().any(pod_is_running),
                Err(e) => {
                    debug!(error = %e, "Pod listing failed, retrying");
                    false
                }
            }
        });
        let result = self.poll(probe, timeout).await_condition().await;

        match result {
            Ok(()) => {
                debug!(namespace, selector, "Pod running");
                Ok(())
            }
            Err(e) => {
                let last = tokio::time::timeout(
                    self.config.poll.interval,
                    cluster.pods(namespace, selector),
                )
                .await;
                let state = match last {
                    Ok(Ok(pods)) => pods.as_slice().state_description(),
                    Ok(Err(err)) => err.to_string(),
                    Err(_) => "pod listing did not respond".to_string(),
                };
                Err(WaitError::new(
                    format!("running pod {selector} in {namespace}"),
                    timeout,
                    e.elapsed(),
                )
                .with_state(state))
            }
        }
    }

    async fn wait_for_log_line(&self, pattern: &Regex) -> Result<(), WaitError> {
        let cluster = self.toolbox.cluster.as_ref();
        let namespace = self.config.namespace.as_str();
        let selector = self.config.controller_selector.as_str();
        let tail = self.config.log_tail;
        let timeout = self.config.poll.log_line;

        let probe = eventually(move || async move {
            match cluster.logs(namespace, selector, tail).await {
                Ok(logs) => logs.lines().any(|line| pattern.is_match(line)),
                Err(e) => {
                    debug!(error = %e, "Log fetch failed, retrying");
                    false
                }
            }
        });
        let result = self.poll(probe, timeout).await_condition().await;

        result.map_err(|e| {
            WaitError::new(
                format!("log line /{}/ from {selector}", pattern.as_str()),
                timeout,
                e.elapsed(),
            )
            .with_state(format!("no match in last {tail} lines"))
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::BadPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(failed: u32) -> RunSummary {
        RunSummary {
            passed: 0,
            failed,
            context_restored: true,
        }
    }

    #[test]
    fn test_exit_code_is_failure_count() {
        assert_eq!(summary(0).exit_code(), 0);
        assert_eq!(summary(3).exit_code(), 3);
    }

    #[test]
    fn test_exit_code_never_collides_with_preflight() {
        assert_eq!(summary(254).exit_code(), 254);
        assert_eq!(summary(255).exit_code(), MAX_FAILURE_EXIT_CODE);
        assert_eq!(summary(10_000).exit_code(), MAX_FAILURE_EXIT_CODE);
    }

    #[test]
    fn test_smoke_error_exit_code() {
        let err = SmokeError::Preflight(PreflightError::MissingTool("kubecfg".to_string()));
        assert_eq!(err.exit_code(), PREFLIGHT_EXIT_CODE);
        assert!(err.to_string().contains("kubecfg"));
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        let err = compile("User.*(cannot").unwrap_err();
        assert!(matches!(err, ConfigError::BadPattern { .. }));
        assert!(compile("User.*cannot").unwrap().is_match(r#"User "system:serviceaccount:kubeless:controller-acct" cannot list"#));
    }
}
