//! rbac-smoke - RBAC smoke test for the kubeless function controller
//!
//! Drives `kubectl`, `kubecfg` and `kubeless` against a running cluster to
//! prove that the controller only works once its RBAC roles are installed:
//! without them the controller log reports a denial and the function call
//! fails, with them the function pod comes up and the call succeeds.
//!
//! # Example (Rust)
//!
//! ```no_run
//! use rbac_smoke::{SmokeConfig, SmokeTest, Toolbox};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SmokeConfig::new("minikube");
//!     let toolbox = Toolbox::from_config(&config);
//!
//!     let summary = SmokeTest::new(config, toolbox)?.run().await?;
//!     std::process::exit(summary.exit_code().into());
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Run against the minikube context
//! rbac-smoke
//!
//! # Run against a kind cluster
//! RBAC_SMOKE_PROVIDER=kind RBAC_SMOKE_CONTEXT=kind-rbac RBAC_SMOKE_CLUSTER=rbac rbac-smoke
//! ```
//!
//! The exit code is the number of failed assertions (at most 254), or 255
//! when a prerequisite is missing.

pub mod assertions;
pub mod client;
pub mod config;
pub mod context;
pub mod eventually;
pub mod fixtures;
pub mod preflight;
pub mod provider;
pub mod runner;
pub mod scenario;
pub mod smoke;
pub mod telemetry;
pub mod wait;

// Re-export commonly used types
pub use assertions::{Outcome, Tally, Verdict};
pub use client::{ClientError, ClusterClient, FunctionClient, ManifestClient};
pub use config::{
    ClusterProviderType, ConfigError, FunctionSpec, ManifestVariant, PollConfig, SmokeConfig,
    ToolPaths,
};
pub use eventually::{eventually, ConditionError};
pub use preflight::PreflightError;
pub use provider::{get_provider, ClusterProvider, ProviderError};
pub use scenario::Scenario;
pub use smoke::{RunSummary, SmokeError, SmokeTest, Toolbox, PREFLIGHT_EXIT_CODE};
pub use wait::WaitError;
