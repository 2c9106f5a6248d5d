use thiserror::Error;
use tracing::warn;

use crate::config::{
    get_trimmed, ENV_FALLBACK_AVAILABILITY_ZONE, ENV_FALLBACK_DEFAULT_REGION, ENV_FALLBACK_REGION,
    ENV_FALLBACK_TASK_ARN, ENV_METADATA_URI,
};
use crate::metadata::{region_from_task_arn, MetadataProvider};

/// Region and identity information for the running task.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub region: String,
    pub availability_zone: String,
    pub task_arn: String,
}

#[derive(Error, Debug)]
#[error("execution region not found: set AWS_REGION or ECS_CONTAINER_METADATA_URI_V4")]
pub struct RegionNotFound;

/// Discovers the execution context: ECS metadata first, environment fallbacks
/// second. Everything short of a missing region degrades to a warning.
pub struct ContextProvider {
    metadata_provider: MetadataProvider,
}

impl ContextProvider {
    pub fn new(metadata_provider: MetadataProvider) -> Self {
        Self { metadata_provider }
    }

    pub fn discover(&self) -> Result<ExecutionContext, RegionNotFound> {
        let mut execution = ExecutionContext::default();
        self.populate_from_metadata(&mut execution);
        apply_env_fallbacks(&mut execution);

        if execution.region.is_empty() {
            return Err(RegionNotFound);
        }

        Ok(execution)
    }

    fn populate_from_metadata(&self, execution: &mut ExecutionContext) {
        let metadata_uri = get_trimmed(ENV_METADATA_URI);
        if metadata_uri.is_empty() {
            return;
        }

        let metadata = match self.metadata_provider.fetch_task_metadata(&metadata_uri) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("failed to load ECS task metadata: {err}");
                return;
            }
        };

        execution.availability_zone = metadata.availability_zone;
        execution.task_arn = metadata.task_arn.clone();

        match region_from_task_arn(&metadata.task_arn) {
            Ok(region) => execution.region = region,
            Err(err) => warn!("unable to derive region from task ARN: {err}"),
        }
    }
}

fn apply_env_fallbacks(execution: &mut ExecutionContext) {
    if execution.region.is_empty() {
        execution.region = get_trimmed(ENV_FALLBACK_REGION);
    }

    if execution.region.is_empty() {
        execution.region = get_trimmed(ENV_FALLBACK_DEFAULT_REGION);
    }

    if execution.availability_zone.is_empty() {
        execution.availability_zone = get_trimmed(ENV_FALLBACK_AVAILABILITY_ZONE);
    }

    if execution.task_arn.is_empty() {
        execution.task_arn = get_trimmed(ENV_FALLBACK_TASK_ARN);
    }
}
