use std::env;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default lifetime for the wrapped service.
pub const DEFAULT_TTL_SECONDS: i64 = 3600;

/// Default graceful shutdown window after the TTL elapses.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: i64 = 15;

/// Default location of the amazon-ssm-agent registration file.
pub const REGISTRATION_FILE_PATH: &str = "/var/lib/amazon/ssm/registration";

/// Directory holding the agent's runtime identity descriptor.
pub const RUNTIME_CONFIG_DIR: &str = "/var/lib/amazon/ssm/runtimeconfig";

const REGISTRATION_BASE: &str = "/var/lib/amazon/ssm";

pub const ENV_MANAGED_INSTANCE_ROLE: &str = "MANAGED_INSTANCE_ROLE_NAME";
pub const ENV_TTL_SECONDS: &str = "TTL_SECONDS";
pub const ENV_TTL_SHUTDOWN_GRACE_SECONDS: &str = "TTL_SHUTDOWN_GRACE_SECONDS";
pub const ENV_REGISTRATION_FILE_OVERRIDE: &str = "SSM_REGISTRATION_FILE";
pub const ENV_METADATA_URI: &str = "ECS_CONTAINER_METADATA_URI_V4";
pub const ENV_FALLBACK_AVAILABILITY_ZONE: &str = "ECS_TASK_AVAILABILITY_ZONE";
pub const ENV_FALLBACK_TASK_ARN: &str = "ECS_TASK_ARN";
pub const ENV_FALLBACK_REGION: &str = "AWS_REGION";
pub const ENV_FALLBACK_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_ACTIVATION_DESCRIPTION: &str = "SSM_ACTIVATION_DESCRIPTION";
pub const ENV_ACTIVATION_EXTRA_TAGS: &str = "SSM_ACTIVATION_EXTRA_TAGS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable not set: `{0}`")]
    MissingVariable(&'static str),

    #[error("invalid duration in `{key}` (`{value}`): {source}")]
    InvalidDuration {
        key: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("`{0}` must be greater than zero")]
    NonPositiveTtl(&'static str),

    #[error("registration path `{0}` is outside /var/lib/amazon/ssm")]
    RegistrationPathOutsideBase(PathBuf),
}

/// Environment-driven settings of the sidecar wrapper.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub ttl: Duration,
    pub shutdown_grace: Duration,
    pub role_name: String,
    pub registration_path: PathBuf,
    pub activation_description: Option<String>,
    pub activation_extra_tags: Vec<(String, String)>,
}

impl SidecarConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ttl_seconds = duration_seconds(ENV_TTL_SECONDS, DEFAULT_TTL_SECONDS)?;
        if ttl_seconds <= 0 {
            return Err(ConfigError::NonPositiveTtl(ENV_TTL_SECONDS));
        }

        // A negative grace means "no grace", not a configuration error.
        let grace_seconds =
            duration_seconds(ENV_TTL_SHUTDOWN_GRACE_SECONDS, DEFAULT_SHUTDOWN_GRACE_SECONDS)?
                .max(0);

        let role_name = require_non_empty(ENV_MANAGED_INSTANCE_ROLE)?;
        let registration_path = resolve_registration_path()?;

        let description = get_trimmed(ENV_ACTIVATION_DESCRIPTION);

        Ok(Self {
            ttl: Duration::from_secs(ttl_seconds as u64),
            shutdown_grace: Duration::from_secs(grace_seconds as u64),
            role_name,
            registration_path,
            activation_description: (!description.is_empty()).then_some(description),
            activation_extra_tags: parse_extra_tags(&get_trimmed(ENV_ACTIVATION_EXTRA_TAGS)),
        })
    }
}

/// Trimmed value of an environment variable, empty if unset.
pub fn get_trimmed(key: &str) -> String {
    env::var(key).unwrap_or_default().trim().to_string()
}

fn duration_seconds(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let value = get_trimmed(key);
    if value.is_empty() {
        return Ok(default);
    }

    value
        .parse::<i64>()
        .map_err(|source| ConfigError::InvalidDuration { key, value, source })
}

fn require_non_empty(key: &'static str) -> Result<String, ConfigError> {
    let value = get_trimmed(key);
    if value.is_empty() {
        return Err(ConfigError::MissingVariable(key));
    }

    Ok(value)
}

/// Determines where the amazon-ssm-agent registration file lives. An override
/// is accepted only when its cleaned path stays under the agent state base.
fn resolve_registration_path() -> Result<PathBuf, ConfigError> {
    let raw = get_trimmed(ENV_REGISTRATION_FILE_OVERRIDE);
    if raw.is_empty() {
        return Ok(PathBuf::from(REGISTRATION_FILE_PATH));
    }

    let clean = lexical_clean(Path::new(&raw));
    if !clean.starts_with(REGISTRATION_BASE) {
        return Err(ConfigError::RegistrationPathOutsideBase(clean));
    }

    Ok(clean)
}

// Lexical normalization only; the path is not required to exist yet.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }

    clean
}

/// Parses `key=value,key2=value2` activation tags; malformed segments are
/// skipped.
fn parse_extra_tags(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|segment| {
            let segment = segment.trim();
            if segment.is_empty() {
                return None;
            }

            let (key, value) = segment.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }

            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;

    fn clear_sidecar_env() {
        for key in [
            ENV_TTL_SECONDS,
            ENV_TTL_SHUTDOWN_GRACE_SECONDS,
            ENV_MANAGED_INSTANCE_ROLE,
            ENV_REGISTRATION_FILE_OVERRIDE,
            ENV_ACTIVATION_DESCRIPTION,
            ENV_ACTIVATION_EXTRA_TAGS,
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_env_unset() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");

        let config = SidecarConfig::from_env().unwrap();

        assert_eq!(Duration::from_secs(3600), config.ttl);
        assert_eq!(Duration::from_secs(15), config.shutdown_grace);
        assert_eq!("sidecar-role", config.role_name);
        assert_eq!(PathBuf::from(REGISTRATION_FILE_PATH), config.registration_path);
        assert_eq!(None, config.activation_description);
        assert!(config.activation_extra_tags.is_empty());
    }

    #[test]
    #[serial]
    fn missing_role_is_an_error() {
        clear_sidecar_env();

        assert_matches!(
            SidecarConfig::from_env(),
            Err(ConfigError::MissingVariable(ENV_MANAGED_INSTANCE_ROLE))
        );
    }

    #[test]
    #[serial]
    fn non_numeric_ttl_is_an_error() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");
        env::set_var(ENV_TTL_SECONDS, "soon");

        assert_matches!(
            SidecarConfig::from_env(),
            Err(ConfigError::InvalidDuration { .. })
        );
    }

    #[test]
    #[serial]
    fn zero_ttl_is_an_error() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");
        env::set_var(ENV_TTL_SECONDS, "0");

        assert_matches!(SidecarConfig::from_env(), Err(ConfigError::NonPositiveTtl(_)));
    }

    #[test]
    #[serial]
    fn negative_grace_clamps_to_zero() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");
        env::set_var(ENV_TTL_SHUTDOWN_GRACE_SECONDS, "-5");

        let config = SidecarConfig::from_env().unwrap();
        assert_eq!(Duration::ZERO, config.shutdown_grace);
    }

    #[test]
    #[serial]
    fn registration_override_outside_base_is_rejected() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");
        env::set_var(
            ENV_REGISTRATION_FILE_OVERRIDE,
            "/var/lib/amazon/ssm/../../../etc/passwd",
        );

        assert_matches!(
            SidecarConfig::from_env(),
            Err(ConfigError::RegistrationPathOutsideBase(_))
        );
    }

    #[test]
    #[serial]
    fn registration_override_inside_base_is_cleaned() {
        clear_sidecar_env();
        env::set_var(ENV_MANAGED_INSTANCE_ROLE, "sidecar-role");
        env::set_var(
            ENV_REGISTRATION_FILE_OVERRIDE,
            "/var/lib/amazon/ssm/./custom/registration",
        );

        let config = SidecarConfig::from_env().unwrap();
        assert_eq!(
            PathBuf::from("/var/lib/amazon/ssm/custom/registration"),
            config.registration_path
        );
    }

    #[test]
    fn extra_tags_skip_malformed_segments() {
        let tags = parse_extra_tags("team=chaos, =nokey, plain, stage = prod ,empty=");

        assert_eq!(
            vec![
                ("team".to_string(), "chaos".to_string()),
                ("stage".to_string(), "prod".to_string()),
                ("empty".to_string(), String::new()),
            ],
            tags
        );
    }

    #[test]
    fn extra_tags_empty_input_yields_nothing() {
        assert!(parse_extra_tags("").is_empty());
    }
}
