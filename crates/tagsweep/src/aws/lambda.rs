//! Lambda function operations

use super::context::AwsContext;
use super::error::{AwsError, ignore_not_found, outcome_of};
use aws_sdk_lambda::Client;
use std::future::Future;
use tagsweep_common::ApiOutcome;

pub trait LambdaOperations: Send + Sync {
    fn function_exists(&self, function_name: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn delete_function(&self, function_name: &str) -> impl Future<Output = ApiOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct LambdaClient {
    client: Client,
}

impl LambdaClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.lambda_client(region),
        }
    }
}

impl LambdaOperations for LambdaClient {
    async fn function_exists(&self, function_name: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(
            self.client
                .get_function()
                .function_name(function_name)
                .send()
                .await,
        )?;
        Ok(response.is_some())
    }

    async fn delete_function(&self, function_name: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_function()
                .function_name(function_name)
                .send()
                .await,
        )
    }
}
