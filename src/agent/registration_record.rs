use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Shape of the amazon-ssm-agent registration file.
#[derive(Debug, Deserialize)]
struct RegistrationRecord {
    #[serde(rename = "ManagedInstanceID", default)]
    managed_instance_id: String,
}

#[derive(Error, Debug)]
pub enum RegistrationRecordError {
    #[error("registration file not found")]
    NotFound,

    #[error("read registration file: {0}")]
    Read(#[source] io::Error),

    #[error("decode registration file: {0}")]
    Decode(#[from] serde_json::Error),
}

pub(crate) fn read_managed_instance_id(path: &Path) -> Result<String, RegistrationRecordError> {
    let data = fs::read_to_string(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            RegistrationRecordError::NotFound
        } else {
            RegistrationRecordError::Read(err)
        }
    })?;

    let record: RegistrationRecord = serde_json::from_str(&data)?;

    Ok(record.managed_instance_id.trim().to_string())
}
