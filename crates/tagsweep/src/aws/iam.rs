//! IAM operations: users, roles and customer-managed policies
//!
//! IAM is not covered by the Resource Groups Tagging API, so this module
//! also carries the listing and tag lookups discovery needs.

use super::context::AwsContext;
use super::error::{AwsError, classify_sdk_error, ignore_not_found, outcome_of};
use aws_sdk_iam::Client;
use aws_sdk_iam::types::{PolicyScopeType, Tag};
use std::future::Future;
use tagsweep_common::ApiOutcome;

/// A user or role as returned by Get*
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub permissions_boundary: Option<String>,
}

/// An IAM entity found while listing, with its ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamEntity {
    /// User/role name, or the policy ARN for policies
    pub name: String,
    pub arn: String,
}

/// Principals a managed policy is attached to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEntities {
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVersion {
    pub version_id: String,
    pub is_default: bool,
}

/// Tag key/value pairs on an IAM entity
pub type Tags = Vec<(String, String)>;

pub trait IamOperations: Send + Sync {
    fn get_user(&self, user: &str) -> impl Future<Output = Result<Option<Principal>, AwsError>> + Send;

    fn get_role(&self, role: &str) -> impl Future<Output = Result<Option<Principal>, AwsError>> + Send;

    fn policy_exists(&self, policy_arn: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// ARNs of managed policies attached to a user
    fn list_attached_user_policies(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    /// Names of inline policies embedded in a user
    fn list_user_policies(&self, user: &str) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    fn list_access_keys(&self, user: &str) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    fn list_attached_role_policies(
        &self,
        role: &str,
    ) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    fn list_role_policies(&self, role: &str) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    /// Names of instance profiles that contain the role
    fn list_instance_profiles_for_role(
        &self,
        role: &str,
    ) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    fn list_entities_for_policy(
        &self,
        policy_arn: &str,
    ) -> impl Future<Output = Result<PolicyEntities, AwsError>> + Send;

    fn list_policy_versions(
        &self,
        policy_arn: &str,
    ) -> impl Future<Output = Result<Vec<PolicyVersion>, AwsError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<IamEntity>, AwsError>> + Send;

    fn list_roles(&self) -> impl Future<Output = Result<Vec<IamEntity>, AwsError>> + Send;

    /// Customer-managed policies only; AWS-managed policies cannot be deleted
    fn list_local_policies(&self) -> impl Future<Output = Result<Vec<IamEntity>, AwsError>> + Send;

    fn user_tags(&self, user: &str) -> impl Future<Output = Result<Tags, AwsError>> + Send;

    fn role_tags(&self, role: &str) -> impl Future<Output = Result<Tags, AwsError>> + Send;

    fn policy_tags(&self, policy_arn: &str) -> impl Future<Output = Result<Tags, AwsError>> + Send;

    fn delete_user_permissions_boundary(&self, user: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn detach_user_policy(&self, user: &str, policy_arn: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_user_policy(&self, user: &str, policy_name: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_access_key(&self, user: &str, access_key_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_user(&self, user: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_role_permissions_boundary(&self, role: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_role_policy(&self, role: &str, policy_name: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn detach_role_policy(&self, role: &str, policy_arn: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn remove_role_from_instance_profile(
        &self,
        profile: &str,
        role: &str,
    ) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_role(&self, role: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn detach_group_policy(&self, group: &str, policy_arn: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_policy(&self, policy_arn: &str) -> impl Future<Output = ApiOutcome> + Send;
}

/// IAM client
#[derive(Debug, Clone)]
pub struct IamClient {
    client: Client,
}

impl IamClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.iam_client(region),
        }
    }
}

/// Extract tags from IAM tag list
fn extract_iam_tags(tags: &[Tag]) -> Tags {
    tags.iter()
        .map(|t| (t.key().to_string(), t.value().to_string()))
        .collect()
}

impl IamOperations for IamClient {
    async fn get_user(&self, user: &str) -> Result<Option<Principal>, AwsError> {
        let response = ignore_not_found(self.client.get_user().user_name(user).send().await)?;
        Ok(response.and_then(|r| {
            r.user().map(|u| Principal {
                name: u.user_name().to_string(),
                permissions_boundary: u
                    .permissions_boundary()
                    .and_then(|b| b.permissions_boundary_arn())
                    .map(str::to_string),
            })
        }))
    }

    async fn get_role(&self, role: &str) -> Result<Option<Principal>, AwsError> {
        let response = ignore_not_found(self.client.get_role().role_name(role).send().await)?;
        Ok(response.and_then(|r| {
            r.role().map(|r| Principal {
                name: r.role_name().to_string(),
                permissions_boundary: r
                    .permissions_boundary()
                    .and_then(|b| b.permissions_boundary_arn())
                    .map(str::to_string),
            })
        }))
    }

    async fn policy_exists(&self, policy_arn: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(self.client.get_policy().policy_arn(policy_arn).send().await)?;
        Ok(response.is_some())
    }

    async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_attached_user_policies()
            .user_name(user)
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            arns.extend(
                page.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );
        }
        Ok(arns)
    }

    async fn list_user_policies(&self, user: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_user_policies()
            .user_name(user)
            .into_paginator()
            .send();
        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            names.extend(page.policy_names().iter().cloned());
        }
        Ok(names)
    }

    async fn list_access_keys(&self, user: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_access_keys()
            .user_name(user)
            .into_paginator()
            .send();
        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            keys.extend(
                page.access_key_metadata()
                    .iter()
                    .filter_map(|k| k.access_key_id().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_attached_role_policies()
            .role_name(role)
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            arns.extend(
                page.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );
        }
        Ok(arns)
    }

    async fn list_role_policies(&self, role: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_role_policies()
            .role_name(role)
            .into_paginator()
            .send();
        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            names.extend(page.policy_names().iter().cloned());
        }
        Ok(names)
    }

    async fn list_instance_profiles_for_role(&self, role: &str) -> Result<Vec<String>, AwsError> {
        let mut pages = self
            .client
            .list_instance_profiles_for_role()
            .role_name(role)
            .into_paginator()
            .send();
        let mut profiles = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            profiles.extend(
                page.instance_profiles()
                    .iter()
                    .map(|p| p.instance_profile_name().to_string()),
            );
        }
        Ok(profiles)
    }

    async fn list_entities_for_policy(&self, policy_arn: &str) -> Result<PolicyEntities, AwsError> {
        let mut pages = self
            .client
            .list_entities_for_policy()
            .policy_arn(policy_arn)
            .into_paginator()
            .send();
        let mut entities = PolicyEntities::default();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            entities
                .users
                .extend(page.policy_users().iter().filter_map(|u| u.user_name().map(str::to_string)));
            entities
                .groups
                .extend(page.policy_groups().iter().filter_map(|g| g.group_name().map(str::to_string)));
            entities
                .roles
                .extend(page.policy_roles().iter().filter_map(|r| r.role_name().map(str::to_string)));
        }
        Ok(entities)
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> Result<Vec<PolicyVersion>, AwsError> {
        let mut pages = self
            .client
            .list_policy_versions()
            .policy_arn(policy_arn)
            .into_paginator()
            .send();
        let mut versions = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            versions.extend(page.versions().iter().filter_map(|v| {
                Some(PolicyVersion {
                    version_id: v.version_id()?.to_string(),
                    is_default: v.is_default_version(),
                })
            }));
        }
        Ok(versions)
    }

    async fn list_users(&self) -> Result<Vec<IamEntity>, AwsError> {
        let mut pages = self.client.list_users().into_paginator().send();
        let mut users = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            users.extend(page.users().iter().map(|u| IamEntity {
                name: u.user_name().to_string(),
                arn: u.arn().to_string(),
            }));
        }
        Ok(users)
    }

    async fn list_roles(&self) -> Result<Vec<IamEntity>, AwsError> {
        let mut pages = self.client.list_roles().into_paginator().send();
        let mut roles = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            roles.extend(page.roles().iter().map(|r| IamEntity {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
            }));
        }
        Ok(roles)
    }

    async fn list_local_policies(&self) -> Result<Vec<IamEntity>, AwsError> {
        let mut pages = self
            .client
            .list_policies()
            .scope(PolicyScopeType::Local)
            .into_paginator()
            .send();
        let mut policies = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            policies.extend(page.policies().iter().filter_map(|p| {
                let arn = p.arn()?.to_string();
                Some(IamEntity {
                    name: arn.clone(),
                    arn,
                })
            }));
        }
        Ok(policies)
    }

    async fn user_tags(&self, user: &str) -> Result<Tags, AwsError> {
        // IAM caps an entity at 50 tags, which always fits in one page
        let response = self
            .client
            .list_user_tags()
            .user_name(user)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(extract_iam_tags(response.tags()))
    }

    async fn role_tags(&self, role: &str) -> Result<Tags, AwsError> {
        let response = self
            .client
            .list_role_tags()
            .role_name(role)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(extract_iam_tags(response.tags()))
    }

    async fn policy_tags(&self, policy_arn: &str) -> Result<Tags, AwsError> {
        let response = self
            .client
            .list_policy_tags()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(extract_iam_tags(response.tags()))
    }

    async fn delete_user_permissions_boundary(&self, user: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_user_permissions_boundary()
                .user_name(user)
                .send()
                .await,
        )
    }

    async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .detach_user_policy()
                .user_name(user)
                .policy_arn(policy_arn)
                .send()
                .await,
        )
    }

    async fn delete_user_policy(&self, user: &str, policy_name: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_user_policy()
                .user_name(user)
                .policy_name(policy_name)
                .send()
                .await,
        )
    }

    async fn delete_access_key(&self, user: &str, access_key_id: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_access_key()
                .user_name(user)
                .access_key_id(access_key_id)
                .send()
                .await,
        )
    }

    async fn delete_user(&self, user: &str) -> ApiOutcome {
        outcome_of(self.client.delete_user().user_name(user).send().await)
    }

    async fn delete_role_permissions_boundary(&self, role: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_role_permissions_boundary()
                .role_name(role)
                .send()
                .await,
        )
    }

    async fn delete_role_policy(&self, role: &str, policy_name: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_role_policy()
                .role_name(role)
                .policy_name(policy_name)
                .send()
                .await,
        )
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .detach_role_policy()
                .role_name(role)
                .policy_arn(policy_arn)
                .send()
                .await,
        )
    }

    async fn remove_role_from_instance_profile(&self, profile: &str, role: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .remove_role_from_instance_profile()
                .instance_profile_name(profile)
                .role_name(role)
                .send()
                .await,
        )
    }

    async fn delete_role(&self, role: &str) -> ApiOutcome {
        outcome_of(self.client.delete_role().role_name(role).send().await)
    }

    async fn detach_group_policy(&self, group: &str, policy_arn: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .detach_group_policy()
                .group_name(group)
                .policy_arn(policy_arn)
                .send()
                .await,
        )
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .delete_policy_version()
                .policy_arn(policy_arn)
                .version_id(version_id)
                .send()
                .await,
        )
    }

    async fn delete_policy(&self, policy_arn: &str) -> ApiOutcome {
        outcome_of(self.client.delete_policy().policy_arn(policy_arn).send().await)
    }
}
