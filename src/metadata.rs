use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_PATH_SUFFIX: &str = "/task";
const STATUS_BODY_LIMIT: usize = 4_096;
const ARN_REGION_INDEX: usize = 3;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("request ECS task metadata: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected ECS metadata status {status}: `{body}`")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("decode ECS metadata response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid task ARN region: `{0}`")]
    InvalidRegion(String),
}

/// Subset of the ECS task metadata used for registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskMetadata {
    #[serde(rename = "AvailabilityZone", default)]
    pub availability_zone: String,

    #[serde(rename = "TaskARN", default)]
    pub task_arn: String,
}

/// Retrieves ECS task metadata from the container metadata endpoint.
pub struct MetadataProvider {
    client: reqwest::blocking::Client,
}

impl MetadataProvider {
    pub fn try_new() -> Result<Self, MetadataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    pub fn fetch_task_metadata(&self, base_uri: &str) -> Result<TaskMetadata, MetadataError> {
        let url = format!("{}{METADATA_PATH_SUFFIX}", base_uri.trim_end_matches('/'));

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(STATUS_BODY_LIMIT)
                .collect();

            return Err(MetadataError::UnexpectedStatus { status, body });
        }

        Ok(serde_json::from_str(&response.text()?)?)
    }
}

/// Extracts the AWS region component from a task ARN.
pub fn region_from_task_arn(task_arn: &str) -> Result<String, MetadataError> {
    let region = task_arn
        .split(':')
        .nth(ARN_REGION_INDEX)
        .ok_or_else(|| MetadataError::InvalidRegion(task_arn.to_string()))?
        .trim();

    if region.is_empty() {
        return Err(MetadataError::InvalidRegion(task_arn.to_string()));
    }

    Ok(region.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::prelude::*;

    #[test]
    fn fetches_and_decodes_task_metadata() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/task");
            then.status(200).json_body(serde_json::json!({
                "AvailabilityZone": "us-east-1b",
                "TaskARN": "arn:aws:ecs:us-east-1:123456789012:task/cluster/abc",
                "Family": "ignored"
            }));
        });

        let provider = MetadataProvider::try_new().unwrap();
        let metadata = provider.fetch_task_metadata(&server.url("")).unwrap();

        mock.assert();
        assert_eq!("us-east-1b", metadata.availability_zone);
        assert_eq!(
            "arn:aws:ecs:us-east-1:123456789012:task/cluster/abc",
            metadata.task_arn
        );
    }

    #[test]
    fn unexpected_status_carries_body_excerpt() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/task");
            then.status(503).body("metadata unavailable");
        });

        let provider = MetadataProvider::try_new().unwrap();
        let err = provider.fetch_task_metadata(&server.url("")).unwrap_err();

        assert_matches!(
            err,
            MetadataError::UnexpectedStatus { status, body }
                if status.as_u16() == 503 && body == "metadata unavailable"
        );
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/task");
            then.status(200).json_body(serde_json::json!({}));
        });

        let provider = MetadataProvider::try_new().unwrap();
        let metadata = provider.fetch_task_metadata(&server.url("")).unwrap();

        assert_eq!("", metadata.availability_zone);
        assert_eq!("", metadata.task_arn);
    }

    #[test]
    fn region_is_the_fourth_arn_component() {
        let region =
            region_from_task_arn("arn:aws:ecs:eu-west-3:123456789012:task/cluster/abc").unwrap();
        assert_eq!("eu-west-3", region);
    }

    #[test]
    fn short_or_empty_arns_are_invalid() {
        assert_matches!(
            region_from_task_arn("arn:aws:ecs"),
            Err(MetadataError::InvalidRegion(_))
        );
        assert_matches!(
            region_from_task_arn("arn:aws:ecs::123:task/x"),
            Err(MetadataError::InvalidRegion(_))
        );
    }
}
