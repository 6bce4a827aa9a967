//! kubeless-backed function client

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{ClientError, FunctionClient};
use crate::config::FunctionSpec;
use crate::runner::{self, RunResult};

/// Function client shelling out to the kubeless CLI
#[derive(Debug, Clone)]
pub struct Kubeless {
    binary: String,
}

impl Kubeless {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Kubeless {
    fn default() -> Self {
        Self::new("kubeless")
    }
}

/// Arguments of `kubeless function deploy`
fn deploy_args(function: &FunctionSpec) -> Vec<String> {
    vec![
        "function".to_string(),
        "deploy".to_string(),
        function.name.clone(),
        "--runtime".to_string(),
        function.runtime.clone(),
        "--handler".to_string(),
        function.handler.clone(),
        "--from-file".to_string(),
        function.from_file.display().to_string(),
        "--trigger-http".to_string(),
    ]
}

#[async_trait]
impl FunctionClient for Kubeless {
    #[instrument(skip(self, function), fields(function = %function.name))]
    async fn deploy(&self, function: &FunctionSpec) -> Result<(), ClientError> {
        let args = deploy_args(function);
        let result = runner::run(&self.binary, args.as_slice()).await?;
        if !result.passed() {
            return Err(ClientError::failed(
                format!("{} function deploy {}", self.binary, function.name),
                &result,
            ));
        }
        info!("Function deploy accepted");
        Ok(())
    }

    #[instrument(skip(self, data))]
    async fn call(&self, name: &str, data: &str) -> Result<RunResult, ClientError> {
        let result = runner::run(&self.binary, &["function", "call", name, "--data", data]).await?;
        debug!(exit_code = result.exit_code, stdout = %result.stdout_trimmed(), "Function called");
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        let result = runner::run(&self.binary, &["function", "delete", name]).await?;
        if !result.passed() {
            return Err(ClientError::failed(
                format!("{} function delete {name}", self.binary),
                &result,
            ));
        }
        Ok(())
    }
}
