use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::agent::{persist_identity, register_agent, RegisterError, RegistrationCleaner};
use crate::cli::Cli;
use crate::command::NotStartedProcess;
use crate::config::{ConfigError, SidecarConfig, RUNTIME_CONFIG_DIR};
use crate::execution::{ContextProvider, ExecutionContext, RegionNotFound};
use crate::metadata::{MetadataError, MetadataProvider};
use crate::provision::{Activation, ActivationService, SsmApiError, SsmService};
use crate::supervisor::{Supervisor, SupervisorError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("read configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("create metadata client: {0}")]
    Metadata(#[from] MetadataError),

    #[error("discover execution context: {0}")]
    Discovery(#[from] RegionNotFound),

    #[error("provision activation: {0}")]
    Provision(#[from] SsmApiError),

    #[error("register SSM agent: {0}")]
    Register(#[from] RegisterError),

    #[error("supervise service: {0}")]
    Supervise(#[from] SupervisorError),
}

/// Command-line entrypoint: provisions a temporary identity, registers the
/// agent, supervises it under the TTL, and tears the identity down again.
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Runs the full sidecar lifecycle and returns the wrapper's exit code.
    pub fn run(self) -> Result<i32, AppError> {
        let config = SidecarConfig::from_env()?;
        let command = self.cli.command();

        let execution = ContextProvider::new(MetadataProvider::try_new()?).discover()?;
        info!(
            region = %execution.region,
            availability_zone = %execution.availability_zone,
            task_arn = %execution.task_arn,
            "discovered execution context"
        );

        let ssm = Arc::new(SsmService::try_new(&execution.region)?);

        let activation = ActivationService::new(
            ssm.clone(),
            config.activation_description.clone(),
            config.activation_extra_tags.clone(),
        )
        .create(&config.role_name, &execution)?;
        info!(activation_id = %activation.activation_id, "created SSM activation");

        let cleaner = RegistrationCleaner::new(
            ssm,
            activation.activation_id.clone(),
            config.registration_path.clone(),
        );

        // Whatever happens past this point, the provisioned identity is torn
        // down exactly once before the wrapper exits.
        let result = register_and_supervise(&config, &execution, &activation, command);

        if let Err(err) = cleaner.cleanup() {
            warn!("cleanup failed: {err}");
        }

        result
    }
}

fn register_and_supervise(
    config: &SidecarConfig,
    execution: &ExecutionContext,
    activation: &Activation,
    command: &[String],
) -> Result<i32, AppError> {
    let agent_path = &command[0];

    register_agent(agent_path, &execution.region, activation)?;
    info!(
        activation_id = %activation.activation_id,
        "registered amazon-ssm-agent with activation"
    );

    if let Err(err) = persist_identity(
        &execution.region,
        &config.registration_path,
        Path::new(RUNTIME_CONFIG_DIR),
    ) {
        warn!("failed to persist runtime identity descriptor: {err}");
    }

    let process = NotStartedProcess::new(agent_path, &command[1..]);
    let outcome = Supervisor::new(config.ttl, config.shutdown_grace).run(process)?;

    if outcome.ttl_expired {
        info!("ttl elapsed; exiting wrapper with status 0");
        return Ok(0);
    }

    Ok(outcome.exit_code)
}
