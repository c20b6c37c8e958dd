//! API Gateway (REST) operations

use super::context::AwsContext;
use super::error::{AwsError, classify_sdk_error, ignore_not_found, outcome_of};
use aws_sdk_apigateway::Client;
use std::future::Future;
use tagsweep_common::ApiOutcome;
use tracing::debug;

/// A base path mapping on a custom domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePathMapping {
    pub domain: String,
    pub base_path: String,
}

/// An (API, stage) pair associated with a usage plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStage {
    pub api_id: String,
    pub stage: String,
}

pub trait ApiGatewayOperations: Send + Sync {
    fn rest_api_exists(&self, api_id: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn stage_exists(
        &self,
        api_id: &str,
        stage: &str,
    ) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn api_key_exists(&self, key_id: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// Stages attached to a usage plan, or `None` if the plan is gone
    fn usage_plan_stages(
        &self,
        plan_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<ApiStage>>, AwsError>> + Send;

    /// Mappings across every custom domain that target the API, optionally
    /// narrowed to one stage
    fn base_path_mappings(
        &self,
        api_id: &str,
        stage: Option<&str>,
    ) -> impl Future<Output = Result<Vec<BasePathMapping>, AwsError>> + Send;

    fn delete_base_path_mapping(
        &self,
        domain: &str,
        base_path: &str,
    ) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_rest_api(&self, api_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_stage(&self, api_id: &str, stage: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_usage_plan(&self, plan_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_api_key(&self, key_id: &str) -> impl Future<Output = ApiOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiGatewayClient {
    client: Client,
}

impl ApiGatewayClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.apigateway_client(region),
        }
    }

    async fn domain_names(&self) -> Result<Vec<String>, AwsError> {
        let mut pages = self.client.get_domain_names().into_paginator().send();
        let mut domains = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            domains.extend(
                page.items()
                    .iter()
                    .filter_map(|d| d.domain_name().map(str::to_string)),
            );
        }
        Ok(domains)
    }
}

impl ApiGatewayOperations for ApiGatewayClient {
    async fn rest_api_exists(&self, api_id: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(self.client.get_rest_api().rest_api_id(api_id).send().await)?;
        Ok(response.is_some())
    }

    async fn stage_exists(&self, api_id: &str, stage: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(
            self.client
                .get_stage()
                .rest_api_id(api_id)
                .stage_name(stage)
                .send()
                .await,
        )?;
        Ok(response.is_some())
    }

    async fn api_key_exists(&self, key_id: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(self.client.get_api_key().api_key(key_id).send().await)?;
        Ok(response.is_some())
    }

    async fn usage_plan_stages(&self, plan_id: &str) -> Result<Option<Vec<ApiStage>>, AwsError> {
        let response = ignore_not_found(
            self.client
                .get_usage_plan()
                .usage_plan_id(plan_id)
                .send()
                .await,
        )?;
        Ok(response.map(|plan| {
            plan.api_stages()
                .iter()
                .filter_map(|s| {
                    Some(ApiStage {
                        api_id: s.api_id()?.to_string(),
                        stage: s.stage()?.to_string(),
                    })
                })
                .collect()
        }))
    }

    async fn base_path_mappings(
        &self,
        api_id: &str,
        stage: Option<&str>,
    ) -> Result<Vec<BasePathMapping>, AwsError> {
        let mut mappings = Vec::new();
        for domain in self.domain_names().await? {
            let mut pages = self
                .client
                .get_base_path_mappings()
                .domain_name(&domain)
                .into_paginator()
                .send();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| classify_sdk_error(&e))?;
                for item in page.items() {
                    if item.rest_api_id() != Some(api_id) {
                        continue;
                    }
                    if stage.is_some() && item.stage() != stage {
                        continue;
                    }
                    if let Some(base_path) = item.base_path() {
                        mappings.push(BasePathMapping {
                            domain: domain.clone(),
                            base_path: base_path.to_string(),
                        });
                    }
                }
            }
        }

        debug!(api_id = %api_id, stage = ?stage, count = mappings.len(), "Found base path mappings");
        Ok(mappings)
    }

    async fn delete_base_path_mapping(&self, domain: &str, base_path: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_base_path_mapping()
                .domain_name(domain)
                .base_path(base_path)
                .send()
                .await,
        )
    }

    async fn delete_rest_api(&self, api_id: &str) -> ApiOutcome {
        outcome_of(self.client.delete_rest_api().rest_api_id(api_id).send().await)
    }

    async fn delete_stage(&self, api_id: &str, stage: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_stage()
                .rest_api_id(api_id)
                .stage_name(stage)
                .send()
                .await,
        )
    }

    async fn delete_usage_plan(&self, plan_id: &str) -> ApiOutcome {
        outcome_of(self.client.delete_usage_plan().usage_plan_id(plan_id).send().await)
    }

    async fn delete_api_key(&self, key_id: &str) -> ApiOutcome {
        outcome_of(self.client.delete_api_key().api_key(key_id).send().await)
    }
}
