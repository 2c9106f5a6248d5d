use std::future::Future;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::Tag;
use thiserror::Error;

const OP_CONFIGURE: &str = "configure";
const OP_CREATE_ACTIVATION: &str = "create-activation";
const OP_DELETE_ACTIVATION: &str = "delete-activation";
const OP_DEREGISTER_INSTANCE: &str = "deregister-managed-instance";

const ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Activation credentials issued by Systems Manager.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    pub activation_id: String,
    pub activation_code: String,
}

/// Inputs for provisioning a managed-instance activation.
#[derive(Debug, Clone, Default)]
pub struct ActivationRequest {
    pub iam_role: String,
    pub description: Option<String>,
    pub default_instance_name: Option<String>,
    pub tags: Vec<(String, String)>,
}

#[derive(Error, Debug, Clone)]
#[error("SSM `{operation}` failed: {message}")]
pub struct SsmApiError {
    operation: &'static str,
    message: String,
}

impl SsmApiError {
    fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    fn deadline(operation: &'static str, deadline: Duration) -> Self {
        Self::new(operation, format!("deadline of {deadline:?} exceeded"))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(message: &str) -> Self {
        Self::new("test", message.to_string())
    }
}

/// Management-plane operations the sidecar needs from Systems Manager.
#[cfg_attr(test, mockall::automock)]
pub trait SsmApi {
    fn create_activation(&self, request: ActivationRequest) -> Result<Activation, SsmApiError>;

    fn delete_activation(&self, activation_id: &str) -> Result<(), SsmApiError>;

    fn deregister_managed_instance(&self, instance_id: &str) -> Result<(), SsmApiError>;
}

/// [`SsmApi`] implementation over the AWS SDK, bridged into this thread-based
/// program through a dedicated runtime. Every call carries its own deadline.
pub struct SsmService {
    runtime: tokio::runtime::Runtime,
    client: aws_sdk_ssm::Client,
}

impl SsmService {
    pub fn try_new(region: &str) -> Result<Self, SsmApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| SsmApiError::new(OP_CONFIGURE, err.to_string()))?;

        let shared_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_owned()))
                .load(),
        );

        Ok(Self {
            client: aws_sdk_ssm::Client::new(&shared_config),
            runtime,
        })
    }

    fn block_on_with_deadline<T, Fut>(
        &self,
        operation: &'static str,
        deadline: Duration,
        fut: Fut,
    ) -> Result<T, SsmApiError>
    where
        Fut: Future<Output = Result<T, SsmApiError>>,
    {
        self.runtime
            .block_on(async { tokio::time::timeout(deadline, fut).await })
            .map_err(|_| SsmApiError::deadline(operation, deadline))?
    }
}

impl SsmApi for SsmService {
    fn create_activation(&self, request: ActivationRequest) -> Result<Activation, SsmApiError> {
        let tags = request
            .tags
            .into_iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|err| SsmApiError::new(OP_CREATE_ACTIVATION, err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let call = self
            .client
            .create_activation()
            .iam_role(request.iam_role)
            .registration_limit(1)
            .set_description(request.description)
            .set_default_instance_name(request.default_instance_name)
            .set_tags((!tags.is_empty()).then_some(tags));

        self.block_on_with_deadline(OP_CREATE_ACTIVATION, ACTIVATION_TIMEOUT, async {
            let output = call.send().await.map_err(|err| {
                SsmApiError::new(OP_CREATE_ACTIVATION, DisplayErrorContext(err).to_string())
            })?;

            Ok(Activation {
                activation_id: output.activation_id().unwrap_or_default().to_owned(),
                activation_code: output.activation_code().unwrap_or_default().to_owned(),
            })
        })
    }

    fn delete_activation(&self, activation_id: &str) -> Result<(), SsmApiError> {
        let call = self.client.delete_activation().activation_id(activation_id);

        self.block_on_with_deadline(OP_DELETE_ACTIVATION, CLEANUP_TIMEOUT, async {
            call.send().await.map_err(|err| {
                SsmApiError::new(OP_DELETE_ACTIVATION, DisplayErrorContext(err).to_string())
            })?;

            Ok(())
        })
    }

    fn deregister_managed_instance(&self, instance_id: &str) -> Result<(), SsmApiError> {
        let call = self
            .client
            .deregister_managed_instance()
            .instance_id(instance_id);

        self.block_on_with_deadline(OP_DEREGISTER_INSTANCE, CLEANUP_TIMEOUT, async {
            call.send().await.map_err(|err| {
                SsmApiError::new(OP_DEREGISTER_INSTANCE, DisplayErrorContext(err).to_string())
            })?;

            Ok(())
        })
    }
}
