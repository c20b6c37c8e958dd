//! SSM Parameter Store operations

use super::context::AwsContext;
use super::error::{AwsError, ignore_not_found, outcome_of};
use aws_sdk_ssm::Client;
use std::future::Future;
use tagsweep_common::ApiOutcome;

pub trait SsmOperations: Send + Sync {
    fn parameter_exists(&self, name: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn delete_parameter(&self, name: &str) -> impl Future<Output = ApiOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct SsmClient {
    client: Client,
}

impl SsmClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.ssm_client(region),
        }
    }
}

impl SsmOperations for SsmClient {
    async fn parameter_exists(&self, name: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(self.client.get_parameter().name(name).send().await)?;
        Ok(response.is_some())
    }

    async fn delete_parameter(&self, name: &str) -> ApiOutcome {
        outcome_of(self.client.delete_parameter().name(name).send().await)
    }
}
