use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::registration_record::{read_managed_instance_id, RegistrationRecordError};
use crate::provision::SsmApi;
use crate::utils::teardown::TeardownOnce;

#[derive(Error, Debug, Clone)]
pub enum CleanerError {
    #[error("delete activation `{id}`: {message}")]
    DeleteActivation { id: String, message: String },

    #[error("read registration: {0}")]
    Registration(String),

    #[error("deregister managed instance `{id}`: {message}")]
    Deregister { id: String, message: String },
}

/// Tears down the provisioned activation and the managed-instance
/// registration.
///
/// Teardown may be requested from more than one code path; the wrapped action
/// runs exactly once and every caller observes the first outcome.
pub struct RegistrationCleaner<S> {
    teardown: TeardownOnce<CleanerError>,
    api: Arc<S>,
    activation_id: String,
    registration_path: PathBuf,
}

impl<S> RegistrationCleaner<S>
where
    S: SsmApi,
{
    pub fn new(api: Arc<S>, activation_id: String, registration_path: PathBuf) -> Self {
        Self {
            teardown: TeardownOnce::new(),
            api,
            activation_id,
            registration_path,
        }
    }

    /// Removes the activation and the managed-instance registration,
    /// returning the first error encountered.
    pub fn cleanup(&self) -> Result<(), CleanerError> {
        self.teardown.execute(|| self.run_cleanup())
    }

    fn run_cleanup(&self) -> Result<(), CleanerError> {
        self.delete_activation()?;
        self.deregister_instance()
    }

    fn delete_activation(&self) -> Result<(), CleanerError> {
        if self.activation_id.is_empty() {
            return Ok(());
        }

        self.api
            .delete_activation(&self.activation_id)
            .map_err(|err| CleanerError::DeleteActivation {
                id: self.activation_id.clone(),
                message: err.to_string(),
            })?;

        info!(activation_id = %self.activation_id, "deleted activation");

        Ok(())
    }

    fn deregister_instance(&self) -> Result<(), CleanerError> {
        let instance_id = match read_managed_instance_id(&self.registration_path) {
            Ok(instance_id) => instance_id,
            // Never registered locally, nothing to deregister.
            Err(RegistrationRecordError::NotFound) => return Ok(()),
            Err(err) => return Err(CleanerError::Registration(err.to_string())),
        };

        if instance_id.is_empty() {
            warn!("managed instance id was empty; skipping deregistration");
            return Ok(());
        }

        self.api
            .deregister_managed_instance(&instance_id)
            .map_err(|err| CleanerError::Deregister {
                id: instance_id.clone(),
                message: err.to_string(),
            })?;

        info!(instance_id = %instance_id, "deregistered managed instance");

        Ok(())
    }
}
