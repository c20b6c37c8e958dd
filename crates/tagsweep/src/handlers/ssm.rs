//! SSM parameters

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, SsmOperations};
use tagsweep_common::{Action, Arn, ResourceKind};

pub struct Parameter;

/// Parameter name from `arn:...:parameter/<name>`.
///
/// Hierarchical names (`/app/db/password`) lose their leading `/` in the ARN;
/// it is restored here.
fn parameter_name(arn: &Arn) -> String {
    let resource = arn.resource();
    let name = resource.strip_prefix("parameter/").unwrap_or(resource);
    if name.contains('/') {
        format!("/{name}")
    } else {
        name.to_string()
    }
}

impl<F: ClientFactory> ResourceHandler<F> for Parameter {
    const KIND: ResourceKind = ResourceKind::SsmParameter;

    type Client = F::Ssm;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Ssm> {
        factory.ssm(region)
    }

    fn resource_id(arn: &Arn) -> String {
        parameter_name(arn)
    }

    async fn query(client: &F::Ssm, arn: &Arn) -> Result<bool, AwsError> {
        client.parameter_exists(&parameter_name(arn)).await
    }

    async fn teardown(client: &F::Ssm, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let name = parameter_name(arn);
        let name = name.as_str();
        steps
            .mutate(Action::delete("parameter", name), || client.delete_parameter(name))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_hierarchical_names() {
        let flat = Arn::parse("arn:aws:ssm:us-east-1:123456789012:parameter/db-password").unwrap();
        assert_eq!(parameter_name(&flat), "db-password");

        let nested = Arn::parse("arn:aws:ssm:us-east-1:123456789012:parameter/app/db/password").unwrap();
        assert_eq!(parameter_name(&nested), "/app/db/password");
    }
}
