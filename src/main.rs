use std::process::ExitCode;

use rbac_smoke::telemetry::init_logging;
use rbac_smoke::{SmokeConfig, SmokeTest, Toolbox, PREFLIGHT_EXIT_CODE};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("ERROR: {e}");
            return ExitCode::from(PREFLIGHT_EXIT_CODE);
        }
    };

    let toolbox = Toolbox::from_config(&config);
    let smoke = match SmokeTest::new(config, toolbox) {
        Ok(smoke) => smoke,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("ERROR: {e}");
            return ExitCode::from(PREFLIGHT_EXIT_CODE);
        }
    };

    let config = smoke.config();
    info!(context = %config.context, cluster = %config.cluster_name, "Starting RBAC smoke test");

    ExitCode::from(smoke.run_to_exit_code().await)
}
