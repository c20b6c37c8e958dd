//! Lambda functions

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, LambdaOperations};
use tagsweep_common::{Action, Arn, ResourceKind};

pub struct Function;

impl<F: ClientFactory> ResourceHandler<F> for Function {
    const KIND: ResourceKind = ResourceKind::LambdaFunction;

    type Client = F::Lambda;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Lambda> {
        factory.lambda(region)
    }

    /// `arn:aws:lambda:<region>:<account>:function:<name>`
    fn resource_id(arn: &Arn) -> String {
        arn.last_field().to_string()
    }

    async fn query(client: &F::Lambda, arn: &Arn) -> Result<bool, AwsError> {
        client.function_exists(arn.last_field()).await
    }

    async fn teardown(client: &F::Lambda, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let name = arn.last_field();
        steps
            .mutate(Action::delete("function", name), || client.delete_function(name))
            .await;
        Ok(())
    }
}
