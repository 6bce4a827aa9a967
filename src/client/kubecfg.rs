//! kubecfg-backed manifest client

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{ClientError, ManifestClient};
use crate::runner;

/// Manifest client shelling out to kubecfg
#[derive(Debug, Clone)]
pub struct Kubecfg {
    binary: String,
}

impl Kubecfg {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn manifest_command(&self, verb: &str, manifest: &Path) -> Result<(), ClientError> {
        let result = runner::run(&self.binary, &[OsStr::new(verb), manifest.as_os_str()]).await?;
        if !result.passed() {
            return Err(ClientError::failed(
                format!("{} {verb} {}", self.binary, manifest.display()),
                &result,
            ));
        }
        Ok(())
    }
}

impl Default for Kubecfg {
    fn default() -> Self {
        Self::new("kubecfg")
    }
}

#[async_trait]
impl ManifestClient for Kubecfg {
    #[instrument(skip(self), fields(manifest = %manifest.display()))]
    async fn delete(&self, manifest: &Path) -> Result<(), ClientError> {
        self.manifest_command("delete", manifest).await
    }

    #[instrument(skip(self), fields(manifest = %manifest.display()))]
    async fn update(&self, manifest: &Path) -> Result<(), ClientError> {
        self.manifest_command("update", manifest).await?;
        info!("Applied manifest");
        Ok(())
    }
}
