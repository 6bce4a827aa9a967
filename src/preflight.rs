//! Prerequisite verification
//!
//! Nothing in the cluster is touched until every check here passes:
//! 1. all required tools resolve on `PATH`
//! 2. the cluster provider reports the cluster as running
//! 3. the target context exists in the kubeconfig
//! 4. the API server serves `rbac.authorization.k8s.io`

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::client::{ClientError, ClusterClient};
use crate::config::SmokeConfig;
use crate::provider::{ClusterProvider, ProviderError};

/// API group advertised by clusters with RBAC enabled
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Reasons the run refuses to start
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("required tool not found on PATH: {0}")]
    MissingTool(String),

    #[error("cluster {cluster} is not running ({provider} provider)")]
    ClusterNotRunning {
        cluster: String,
        provider: &'static str,
    },

    #[error("could not determine cluster status: {0}")]
    Provider(#[from] ProviderError),

    #[error("context {0} is not defined in the kubeconfig")]
    ContextNotConfigured(String),

    #[error("RBAC is not enabled on the cluster behind context {0}")]
    RbacDisabled(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Locate `tool` the way a shell would
///
/// Names containing a path separator are checked as-is, bare names are
/// searched in every directory of `search_path`.
pub fn resolve_tool(tool: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let candidate = Path::new(tool);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_path?)
        .map(|dir| dir.join(tool))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Whether an `api-versions` listing includes the RBAC group
pub fn rbac_enabled(api_versions: &[String]) -> bool {
    api_versions
        .iter()
        .any(|version| version.split('/').next() == Some(RBAC_API_GROUP))
}

/// Check every tool against `PATH`
pub fn verify_tools(config: &SmokeConfig) -> Result<(), PreflightError> {
    let search_path = std::env::var_os("PATH");

    for tool in config.required_tools() {
        match resolve_tool(&tool, search_path.as_deref()) {
            Some(path) => debug!(tool = %tool, path = %path.display(), "Resolved tool"),
            None => return Err(PreflightError::MissingTool(tool)),
        }
    }
    Ok(())
}

/// Run all prerequisite checks in order, stopping at the first failure
#[instrument(skip_all, fields(context = %config.context, cluster = %config.cluster_name))]
pub async fn verify(
    config: &SmokeConfig,
    provider: &dyn ClusterProvider,
    cluster: &dyn ClusterClient,
) -> Result<(), PreflightError> {
    verify_tools(config)?;

    if !provider.is_running(&config.cluster_name).await? {
        return Err(PreflightError::ClusterNotRunning {
            cluster: config.cluster_name.clone(),
            provider: provider.name(),
        });
    }

    let contexts = cluster.contexts().await?;
    if !contexts.iter().any(|name| name == &config.context) {
        return Err(PreflightError::ContextNotConfigured(config.context.clone()));
    }

    let api_versions = cluster.api_versions(&config.context).await?;
    if !rbac_enabled(&api_versions) {
        return Err(PreflightError::RbacDisabled(config.context.clone()));
    }

    info!("Preflight checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterProviderType, ToolPaths};

    fn this_binary() -> String {
        std::env::current_exe().unwrap().display().to_string()
    }

    #[test]
    fn test_resolve_tool_absolute_path() {
        let exe = this_binary();
        assert_eq!(resolve_tool(&exe, None), Some(PathBuf::from(&exe)));
        assert_eq!(resolve_tool("/definitely/not/here/kubectl", None), None);
    }

    #[test]
    fn test_resolve_tool_searches_path() {
        let exe = std::env::current_exe().unwrap();
        let dir = exe.parent().unwrap();
        let name = exe.file_name().unwrap().to_str().unwrap();

        let search = std::env::join_paths(["/definitely/not/here", dir.to_str().unwrap()]).unwrap();
        assert_eq!(resolve_tool(name, Some(search.as_os_str())), Some(exe.clone()));
        assert_eq!(resolve_tool("kubeless-missing-xyz", Some(search.as_os_str())), None);
        assert_eq!(resolve_tool(name, None), None);
    }

    #[test]
    fn test_rbac_enabled() {
        let versions: Vec<String> = ["apps/v1", "rbac.authorization.k8s.io/v1", "v1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(rbac_enabled(&versions));

        let versions = vec!["apps/v1".to_string(), "v1".to_string()];
        assert!(!rbac_enabled(&versions));

        let versions = vec!["rbac.authorization.k8s.io.example.com/v1".to_string()];
        assert!(!rbac_enabled(&versions));
    }

    #[test]
    fn test_verify_tools_reports_missing_tool() {
        let exe = this_binary();
        let config = SmokeConfig::default()
            .provider(ClusterProviderType::Existing)
            .tools(ToolPaths::default().kubectl(&exe).kubecfg(&exe).kubeless("kubeless-missing-xyz"));

        match verify_tools(&config) {
            Err(PreflightError::MissingTool(tool)) => assert_eq!(tool, "kubeless-missing-xyz"),
            other => panic!("expected MissingTool, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_tools_accepts_paths() {
        let exe = this_binary();
        let config = SmokeConfig::default()
            .provider(ClusterProviderType::Existing)
            .tools(ToolPaths::default().kubectl(&exe).kubecfg(&exe).kubeless(&exe));

        assert!(verify_tools(&config).is_ok());
    }
}
