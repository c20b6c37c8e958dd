//! IAM users, roles and customer-managed policies
//!
//! IAM refuses to delete principals that still have policies, keys or
//! instance profiles attached, so each handler strips those first.

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, IamOperations};
use tagsweep_common::{Action, Arn, ResourceKind, StepReport};

pub struct User;
pub struct Role;
pub struct Policy;

impl<F: ClientFactory> ResourceHandler<F> for User {
    const KIND: ResourceKind = ResourceKind::IamUser;

    type Client = F::Iam;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Iam> {
        factory.iam(region)
    }

    async fn query(client: &F::Iam, arn: &Arn) -> Result<bool, AwsError> {
        Ok(client.get_user(arn.resource_id()).await?.is_some())
    }

    async fn teardown(client: &F::Iam, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let user = arn.resource_id();
        let principal = match client.get_user(user).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Ok(()),
            Err(e) => {
                steps.record(StepReport::query_failed("user", user, e.detail()));
                return Ok(());
            }
        };

        if principal.permissions_boundary.is_some() {
            steps
                .mutate(Action::detach("permissions-boundary", "N/A", "user", user), || {
                    client.delete_user_permissions_boundary(user)
                })
                .await;
        }

        let attached = steps.listed(
            client.list_attached_user_policies(user).await,
            "attached policies",
            "user",
            user,
        );
        for policy_arn in &attached {
            let policy_arn = policy_arn.as_str();
            steps
                .mutate(Action::detach("policy", policy_arn, "user", user), || {
                    client.detach_user_policy(user, policy_arn)
                })
                .await;
        }

        let inline = steps.listed(client.list_user_policies(user).await, "embedded policies", "user", user);
        for name in &inline {
            let name = name.as_str();
            steps
                .mutate(Action::delete("embedded-policy", name), || {
                    client.delete_user_policy(user, name)
                })
                .await;
        }

        let keys = steps.listed(client.list_access_keys(user).await, "access keys", "user", user);
        for key_id in &keys {
            let key_id = key_id.as_str();
            steps
                .mutate(Action::delete("access-key", key_id), || {
                    client.delete_access_key(user, key_id)
                })
                .await;
        }

        steps
            .mutate(Action::delete("user", user), || client.delete_user(user))
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for Role {
    const KIND: ResourceKind = ResourceKind::IamRole;

    type Client = F::Iam;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Iam> {
        factory.iam(region)
    }

    async fn query(client: &F::Iam, arn: &Arn) -> Result<bool, AwsError> {
        Ok(client.get_role(arn.resource_id()).await?.is_some())
    }

    async fn teardown(client: &F::Iam, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let role = arn.resource_id();
        let principal = match client.get_role(role).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Ok(()),
            Err(e) => {
                steps.record(StepReport::query_failed("role", role, e.detail()));
                return Ok(());
            }
        };

        if principal.permissions_boundary.is_some() {
            let boundary_id = format!("permissions-boundary-{role}");
            steps
                .mutate(Action::delete("role-permissions-boundary", boundary_id), || {
                    client.delete_role_permissions_boundary(role)
                })
                .await;
        }

        let inline = steps.listed(client.list_role_policies(role).await, "embedded policies", "role", role);
        for name in &inline {
            let name = name.as_str();
            steps
                .mutate(Action::delete("embedded-policy", name), || {
                    client.delete_role_policy(role, name)
                })
                .await;
        }

        let attached = steps.listed(
            client.list_attached_role_policies(role).await,
            "attached policies",
            "role",
            role,
        );
        for policy_arn in &attached {
            let policy_arn = policy_arn.as_str();
            steps
                .mutate(Action::detach("policy", policy_arn, "role", role), || {
                    client.detach_role_policy(role, policy_arn)
                })
                .await;
        }

        let profiles = steps.listed(
            client.list_instance_profiles_for_role(role).await,
            "instance profiles",
            "role",
            role,
        );
        for profile in &profiles {
            let profile = profile.as_str();
            steps
                .mutate(Action::detach("role", role, "instance-profile", profile), || {
                    client.remove_role_from_instance_profile(profile, role)
                })
                .await;
        }

        steps
            .mutate(Action::delete("role", role), || client.delete_role(role))
            .await;
        Ok(())
    }
}

impl<F: ClientFactory> ResourceHandler<F> for Policy {
    const KIND: ResourceKind = ResourceKind::IamPolicy;

    type Client = F::Iam;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Iam> {
        factory.iam(region)
    }

    async fn query(client: &F::Iam, arn: &Arn) -> Result<bool, AwsError> {
        client.policy_exists(arn.as_str()).await
    }

    async fn teardown(client: &F::Iam, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let policy_arn = arn.as_str();
        let policy_name = arn.resource_id();

        let entities = steps.listed(
            client.list_entities_for_policy(policy_arn).await,
            "entities",
            "policy",
            policy_name,
        );
        for user in &entities.users {
            let user = user.as_str();
            steps
                .mutate(Action::detach("policy", policy_arn, "user", user), || {
                    client.detach_user_policy(user, policy_arn)
                })
                .await;
        }
        for group in &entities.groups {
            let group = group.as_str();
            steps
                .mutate(Action::detach("policy", policy_arn, "group", group), || {
                    client.detach_group_policy(group, policy_arn)
                })
                .await;
        }
        for role in &entities.roles {
            let role = role.as_str();
            steps
                .mutate(Action::detach("policy", policy_arn, "role", role), || {
                    client.detach_role_policy(role, policy_arn)
                })
                .await;
        }

        let versions = steps.listed(
            client.list_policy_versions(policy_arn).await,
            "versions",
            "policy",
            policy_name,
        );
        // The default version goes with the policy itself
        for version in versions.iter().filter(|v| !v.is_default) {
            let version_id = version.version_id.as_str();
            steps
                .mutate(
                    Action::delete("policy-version", format!("{policy_name}-{version_id}")),
                    || client.delete_policy_version(policy_arn, version_id),
                )
                .await;
        }

        steps
            .mutate(Action::delete("policy", policy_arn), || client.delete_policy(policy_arn))
            .await;
        Ok(())
    }
}
