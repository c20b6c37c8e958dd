//! API Gateway REST APIs, usage plans, stages and API keys
//!
//! API Gateway ARNs carry a path instead of a resource ID:
//! `arn:aws:apigateway:<region>::/restapis/<api>/stages/<stage>`.

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{ApiGatewayOperations, AwsError, ClientFactory};
use tagsweep_common::{Action, Arn, ResourceKind};

pub struct RestApi;
pub struct UsagePlan;
pub struct Stage;
pub struct ApiKey;

/// `(api_id, stage_name)` of a stage ARN
fn stage_parts(arn: &Arn) -> (&str, &str) {
    let segments = arn.path_segments();
    let api_id = segments.get(2).copied().unwrap_or_default();
    let stage = segments.get(4).copied().unwrap_or_default();
    (api_id, stage)
}

/// Delete every base path mapping routing to the API (or one of its stages).
async fn delete_base_path_mappings<C: ApiGatewayOperations>(
    client: &C,
    steps: &mut Steps<'_>,
    api_id: &str,
    stage: Option<&str>,
    owner: (&str, &str),
) {
    let (owner_type, owner_id) = owner;
    let mappings = steps.listed(
        client.base_path_mappings(api_id, stage).await,
        "base path mappings",
        owner_type,
        owner_id,
    );

    for mapping in &mappings {
        let (domain, base_path) = (mapping.domain.as_str(), mapping.base_path.as_str());
        steps
            .mutate(Action::delete("base-path-mapping", base_path), || {
                client.delete_base_path_mapping(domain, base_path)
            })
            .await;
    }
}

impl<F: ClientFactory> ResourceHandler<F> for RestApi {
    const KIND: ResourceKind = ResourceKind::ApiGatewayRestApi;

    type Client = F::ApiGateway;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::ApiGateway> {
        factory.apigateway(region)
    }

    async fn query(client: &F::ApiGateway, arn: &Arn) -> Result<bool, AwsError> {
        client.rest_api_exists(arn.resource_id()).await
    }

    async fn teardown(
        client: &F::ApiGateway,
        arn: &Arn,
        steps: &mut Steps<'_>,
    ) -> Result<(), Precondition> {
        let api_id = arn.resource_id();
        delete_base_path_mappings(client, steps, api_id, None, ("rest-api", api_id)).await;

        steps
            .mutate(Action::delete("rest-api", api_id), || client.delete_rest_api(api_id))
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for UsagePlan {
    const KIND: ResourceKind = ResourceKind::ApiGatewayUsagePlan;

    type Client = F::ApiGateway;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::ApiGateway> {
        factory.apigateway(region)
    }

    async fn query(client: &F::ApiGateway, arn: &Arn) -> Result<bool, AwsError> {
        Ok(client.usage_plan_stages(arn.resource_id()).await?.is_some())
    }

    async fn teardown(
        client: &F::ApiGateway,
        arn: &Arn,
        steps: &mut Steps<'_>,
    ) -> Result<(), Precondition> {
        let plan_id = arn.resource_id();
        let stages = steps
            .listed(
                client.usage_plan_stages(plan_id).await,
                "api stages",
                "usage-plan",
                plan_id,
            )
            .unwrap_or_default();

        for api_stage in &stages {
            let (api_id, stage) = (api_stage.api_id.as_str(), api_stage.stage.as_str());
            delete_base_path_mappings(client, steps, api_id, Some(stage), ("api-stage", stage)).await;
            steps
                .mutate(Action::delete("api-stage", stage), || client.delete_stage(api_id, stage))
                .await;
        }

        steps
            .mutate(Action::delete("usage-plan", plan_id), || {
                client.delete_usage_plan(plan_id)
            })
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for Stage {
    const KIND: ResourceKind = ResourceKind::ApiGatewayStage;

    type Client = F::ApiGateway;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::ApiGateway> {
        factory.apigateway(region)
    }

    async fn query(client: &F::ApiGateway, arn: &Arn) -> Result<bool, AwsError> {
        let (api_id, stage) = stage_parts(arn);
        client.stage_exists(api_id, stage).await
    }

    async fn teardown(
        client: &F::ApiGateway,
        arn: &Arn,
        steps: &mut Steps<'_>,
    ) -> Result<(), Precondition> {
        let (api_id, stage) = stage_parts(arn);
        delete_base_path_mappings(client, steps, api_id, Some(stage), ("api-stage", stage)).await;

        steps
            .mutate(Action::delete("api-stage", stage), || client.delete_stage(api_id, stage))
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for ApiKey {
    const KIND: ResourceKind = ResourceKind::ApiGatewayApiKey;

    type Client = F::ApiGateway;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::ApiGateway> {
        factory.apigateway(region)
    }

    async fn query(client: &F::ApiGateway, arn: &Arn) -> Result<bool, AwsError> {
        client.api_key_exists(arn.resource_id()).await
    }

    async fn teardown(
        client: &F::ApiGateway,
        arn: &Arn,
        steps: &mut Steps<'_>,
    ) -> Result<(), Precondition> {
        let key_id = arn.resource_id();
        steps
            .mutate(Action::delete("api-key", key_id), || client.delete_api_key(key_id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parts_from_arn() {
        let arn = Arn::parse("arn:aws:apigateway:us-east-1::/restapis/a1b2c3/stages/prod").unwrap();
        assert_eq!(stage_parts(&arn), ("a1b2c3", "prod"));

        let truncated = Arn::parse("arn:aws:apigateway:us-east-1::/restapis/a1b2c3/stages").unwrap();
        assert_eq!(stage_parts(&truncated), ("a1b2c3", ""));
    }
}
