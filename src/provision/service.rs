use std::sync::Arc;

use super::ssm::{Activation, ActivationRequest, SsmApi, SsmApiError};
use crate::config::{ENV_FALLBACK_AVAILABILITY_ZONE, ENV_FALLBACK_TASK_ARN};
use crate::execution::ExecutionContext;

/// Marks activations provisioned by this sidecar so stray ones can be found.
const FAULT_INJECTION_SIDECAR_TAG_KEY: &str = "FAULT_INJECTION_SIDECAR";
const FAULT_INJECTION_SIDECAR_TAG_VALUE: &str = "true";

const DEFAULT_TAG_CAPACITY: usize = 4;

/// Provisions managed-instance activations for the wrapped agent.
pub struct ActivationService<S> {
    api: Arc<S>,
    description_override: Option<String>,
    extra_tags: Vec<(String, String)>,
}

impl<S> ActivationService<S>
where
    S: SsmApi,
{
    pub fn new(
        api: Arc<S>,
        description_override: Option<String>,
        extra_tags: Vec<(String, String)>,
    ) -> Self {
        Self {
            api,
            description_override,
            extra_tags,
        }
    }

    /// Creates a single-registration activation described and tagged with the
    /// execution context.
    pub fn create(
        &self,
        role_name: &str,
        execution: &ExecutionContext,
    ) -> Result<Activation, SsmApiError> {
        let request = ActivationRequest {
            iam_role: role_name.to_string(),
            description: self.description(execution),
            default_instance_name: (!execution.task_arn.is_empty())
                .then(|| execution.task_arn.clone()),
            tags: self.tags(execution),
        };

        self.api.create_activation(request)
    }

    fn description(&self, execution: &ExecutionContext) -> Option<String> {
        if let Some(description) = &self.description_override {
            return Some(description.clone());
        }

        (!execution.task_arn.is_empty())
            .then(|| format!("SSM agent sidecar for {}", execution.task_arn))
    }

    fn tags(&self, execution: &ExecutionContext) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(DEFAULT_TAG_CAPACITY);

        if !execution.availability_zone.is_empty() {
            tags.push((
                ENV_FALLBACK_AVAILABILITY_ZONE.to_string(),
                execution.availability_zone.clone(),
            ));
        }

        if !execution.task_arn.is_empty() {
            tags.push((ENV_FALLBACK_TASK_ARN.to_string(), execution.task_arn.clone()));
        }

        tags.push((
            FAULT_INJECTION_SIDECAR_TAG_KEY.to_string(),
            FAULT_INJECTION_SIDECAR_TAG_VALUE.to_string(),
        ));

        tags.extend(self.extra_tags.iter().cloned());

        tags
    }
}
