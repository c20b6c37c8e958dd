//! EC2 instances, security groups and volumes

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, Ec2Operations};
use crate::wait::wait_for_resource;
use tagsweep_common::{Action, ApiErrorDetail, ApiOutcome, Arn, ResourceKind, StepReport};
use tracing::debug;

pub struct Instance;
pub struct SecurityGroup;
pub struct Volume;

/// Swap an instance's security groups for `remaining`.
///
/// An instance must keep at least one group, so when nothing would remain the
/// VPC's `default` group is attached instead.
async fn detach_security_group<C: Ec2Operations>(
    client: &C,
    steps: &mut Steps<'_>,
    instance_id: &str,
    vpc_id: Option<&str>,
    group_id: &str,
    remaining: &[String],
) -> Result<(), Precondition> {
    let action = Action::detach("security-group", group_id, "instance", instance_id);

    // Dry runs never look up the default group, so a VPC without one still plans cleanly.
    let groups = if remaining.is_empty() && !steps.is_dry_run() {
        match client.default_security_group(vpc_id).await {
            Ok(Some(default)) => vec![default],
            Ok(None) => {
                return Err(Precondition::NoDefaultSecurityGroup {
                    instance_id: instance_id.to_string(),
                    security_group_id: group_id.to_string(),
                });
            }
            Err(e) => {
                steps.record(StepReport::failure(action.failure_message(), Some(e.detail())));
                return Ok(());
            }
        }
    } else {
        remaining.to_vec()
    };

    debug!(instance_id = %instance_id, groups = ?groups, "Replacing security groups");
    let groups = groups.as_slice();
    steps
        .mutate(action, || client.set_instance_security_groups(instance_id, groups))
        .await;
    Ok(())
}

impl<F: ClientFactory> ResourceHandler<F> for Instance {
    const KIND: ResourceKind = ResourceKind::Ec2Instance;

    type Client = F::Ec2;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Ec2> {
        factory.ec2(region)
    }

    async fn query(client: &F::Ec2, arn: &Arn) -> Result<bool, AwsError> {
        let instance = client.describe_instance(arn.resource_id()).await?;
        Ok(instance.is_some_and(|i| !i.is_terminated()))
    }

    async fn teardown(client: &F::Ec2, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let instance_id = arn.resource_id();
        let instance = match client.describe_instance(instance_id).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return Ok(()),
            Err(e) => {
                steps.record(StepReport::query_failed("instance", instance_id, e.detail()));
                return Ok(());
            }
        };

        let mut remaining = instance.security_groups.clone();
        for group_id in &instance.security_groups {
            remaining.retain(|g| g != group_id);
            detach_security_group(
                client,
                steps,
                instance_id,
                instance.vpc_id.as_deref(),
                group_id,
                &remaining,
            )
            .await?;
        }

        for device in instance.detachable_volumes() {
            let volume_id = device.volume_id.as_str();
            steps
                .mutate(Action::detach("volume", volume_id, "instance", instance_id), || {
                    client.detach_volume(volume_id, instance_id)
                })
                .await;
        }

        let action = Action::delete("instance", instance_id);
        let mut outcome = steps
            .call(&action, || client.terminate_instance(instance_id))
            .await;

        if outcome.is_accepted() && !steps.is_dry_run() {
            let ctx = steps.context();
            let waited = wait_for_resource(
                &ctx.termination_wait,
                Some(&ctx.cancel),
                || async move {
                    match client.describe_instance(instance_id).await {
                        Ok(Some(instance)) => Ok(instance.is_terminated()),
                        Ok(None) => Ok(true),
                        Err(e) if e.is_retryable() => Ok(false),
                        Err(e) => Err(e.into()),
                    }
                },
                instance_id,
            )
            .await;

            if let Err(e) = waited {
                outcome = ApiOutcome::failed(
                    0,
                    ApiErrorDetail::new("TerminationNotConfirmed", format!("{e:#}")),
                );
            }
        }

        steps.record(StepReport::from_outcome(&action, &outcome));
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for SecurityGroup {
    const KIND: ResourceKind = ResourceKind::Ec2SecurityGroup;

    type Client = F::Ec2;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Ec2> {
        factory.ec2(region)
    }

    async fn query(client: &F::Ec2, arn: &Arn) -> Result<bool, AwsError> {
        client.security_group_exists(arn.resource_id()).await
    }

    async fn teardown(client: &F::Ec2, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let group_id = arn.resource_id();
        let instances = steps.listed(
            client.instances_with_security_group(group_id).await,
            "instances",
            "security-group",
            group_id,
        );

        for instance in &instances {
            let remaining: Vec<String> = instance
                .security_groups
                .iter()
                .filter(|g| g.as_str() != group_id)
                .cloned()
                .collect();
            detach_security_group(
                client,
                steps,
                &instance.instance_id,
                instance.vpc_id.as_deref(),
                group_id,
                &remaining,
            )
            .await?;
        }

        steps
            .mutate(Action::delete("security-group", group_id), || {
                client.delete_security_group(group_id)
            })
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for Volume {
    const KIND: ResourceKind = ResourceKind::Ec2Volume;

    type Client = F::Ec2;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Ec2> {
        factory.ec2(region)
    }

    async fn query(client: &F::Ec2, arn: &Arn) -> Result<bool, AwsError> {
        Ok(client.volume_attachments(arn.resource_id()).await?.is_some())
    }

    async fn teardown(client: &F::Ec2, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let volume_id = arn.resource_id();
        let attached = steps
            .listed(
                client.volume_attachments(volume_id).await,
                "attachments",
                "volume",
                volume_id,
            )
            .unwrap_or_default();

        for instance_id in &attached {
            let instance_id = instance_id.as_str();
            steps
                .mutate(Action::detach("volume", volume_id, "instance", instance_id), || {
                    client.detach_volume(volume_id, instance_id)
                })
                .await;
        }

        steps
            .mutate(Action::delete("volume", volume_id), || client.delete_volume(volume_id))
            .await;
        Ok(())
    }
}
