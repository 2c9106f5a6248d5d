use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::registration_record::{read_managed_instance_id, RegistrationRecordError};

const IDENTITY_CONFIG_FILE: &str = "identity_config.json";

const RUNTIME_DIR_MODE: u32 = 0o700;
const RUNTIME_FILE_MODE: u32 = 0o600;

/// On-prem identity descriptor consumed by the agent's runtime config.
#[derive(Debug, Serialize)]
struct RuntimeIdentity {
    #[serde(rename = "IdentityType")]
    identity_type: &'static str,

    #[serde(rename = "OnPremRegistrationType")]
    registration_type: &'static str,

    #[serde(rename = "OnPremRegion")]
    region: String,

    #[serde(rename = "OnPremManagedInstanceID")]
    managed_instance_id: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("registration record: {0}")]
    Registration(#[from] RegistrationRecordError),

    #[error("registration file missing managed instance id")]
    MissingManagedInstanceId,

    #[error("create runtime config dir: {0}")]
    CreateDir(#[source] io::Error),

    #[error("encode runtime identity: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("write runtime identity: {0}")]
    Write(#[source] io::Error),
}

/// Persists the runtime identity descriptor next to the agent's state, so the
/// registered identity survives agent restarts within the task's lifetime.
pub fn persist_identity(
    region: &str,
    registration_path: &Path,
    runtime_config_dir: &Path,
) -> Result<(), IdentityError> {
    let managed_instance_id = read_managed_instance_id(registration_path)?;
    if managed_instance_id.is_empty() {
        return Err(IdentityError::MissingManagedInstanceId);
    }

    fs::create_dir_all(runtime_config_dir).map_err(IdentityError::CreateDir)?;
    fs::set_permissions(
        runtime_config_dir,
        fs::Permissions::from_mode(RUNTIME_DIR_MODE),
    )
    .map_err(IdentityError::CreateDir)?;

    let identity = RuntimeIdentity {
        identity_type: "OnPrem",
        registration_type: "Managed",
        region: region.to_string(),
        managed_instance_id,
    };

    let target = runtime_config_dir.join(IDENTITY_CONFIG_FILE);
    fs::write(&target, serde_json::to_vec(&identity)?).map_err(IdentityError::Write)?;
    fs::set_permissions(&target, fs::Permissions::from_mode(RUNTIME_FILE_MODE))
        .map_err(IdentityError::Write)?;

    info!(path = %target.display(), "persisted runtime identity descriptor");

    Ok(())
}
