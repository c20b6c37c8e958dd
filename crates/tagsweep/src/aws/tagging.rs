//! Resource Groups Tagging API lookups

use super::context::AwsContext;
use super::error::{AwsError, classify_sdk_error};
use aws_sdk_resourcegroupstagging::Client;
use aws_sdk_resourcegroupstagging::types::TagFilter;
use std::future::Future;
use tracing::debug;

pub trait TaggingOperations: Send + Sync {
    /// ARNs of every resource in the client's region carrying `key=value`
    fn resources_by_tag(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;
}

#[derive(Debug, Clone)]
pub struct TaggingClient {
    client: Client,
}

impl TaggingClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.tagging_client(region),
        }
    }
}

impl TaggingOperations for TaggingClient {
    async fn resources_by_tag(&self, key: &str, value: &str) -> Result<Vec<String>, AwsError> {
        let filter = TagFilter::builder().key(key).values(value).build();
        let mut pages = self
            .client
            .get_resources()
            .tag_filters(filter)
            .into_paginator()
            .send();

        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            arns.extend(
                page.resource_tag_mapping_list()
                    .iter()
                    .filter_map(|m| m.resource_arn().map(str::to_string)),
            );
        }

        debug!(tag_key = %key, tag_value = %value, count = arns.len(), "Tagging API lookup complete");
        Ok(arns)
    }
}
