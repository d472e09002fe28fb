//! td-query binary
//!
//! Usage: `td-query my_db my_table -m 1412121600 -M 1412208000 [-f csv] [-e hive]`

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use job_lifecycle::{JobLifecycleController, QueryServiceConfig, TreasureDataConnector};
use td_query::{initialize_logging, run_cli, Invocation};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env if present
    dotenv::dotenv().ok();

    let code =
        run_cli(std::env::args_os(), prepare, &mut std::io::stdout(), &mut std::io::stderr())
            .await;
    ExitCode::from(code)
}

fn prepare(invocation: &Invocation) -> Result<JobLifecycleController> {
    initialize_logging(invocation.log_format)?;

    let config = QueryServiceConfig::load(invocation.config.as_deref())
        .context("Failed to load configuration")?;
    config.client.api_key()?;
    info!(endpoint = %config.client.endpoint, "Configuration loaded");

    let connector = TreasureDataConnector::new(config.client);
    Ok(JobLifecycleController::new(Arc::new(connector), config.backoff)?)
}
