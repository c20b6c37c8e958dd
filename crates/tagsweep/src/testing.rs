//! In-memory AWS stand-in for tests
//!
//! [`FakeCloud`] implements every collaborator trait and [`ClientFactory`]
//! over a shared [`CloudState`]. Mutations change the state the way AWS
//! would (including refusing to delete resources that still have
//! dependents) and are appended to a call log so tests can assert on exact
//! call counts. Reads are not logged.

use crate::aws::{
    ApiGatewayOperations, ApiStage, AwsError, BasePathMapping, BlockDevice, ClientFactory,
    Ec2Operations, IamEntity, IamOperations, InstanceInfo, KmsOperations, LambdaOperations,
    PolicyEntities, PolicyVersion, Principal, S3Operations, SsmOperations, Tags,
    TaggingOperations, classify_aws_error,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tagsweep_common::{ApiErrorDetail, ApiOutcome};

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default)]
pub struct FakePrincipal {
    pub permissions_boundary: Option<String>,
    pub attached_policies: Vec<String>,
    pub inline_policies: Vec<String>,
    pub access_keys: Vec<String>,
    pub instance_profiles: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default)]
pub struct FakePolicy {
    pub versions: Vec<PolicyVersion>,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct FakeMapping {
    pub domain: String,
    pub base_path: String,
    pub api_id: String,
    pub stage: Option<String>,
}

/// Everything the fake account contains
#[derive(Debug, Default)]
pub struct CloudState {
    pub instances: BTreeMap<String, InstanceInfo>,
    pub security_groups: BTreeSet<String>,
    /// VPC ID to its `default` group
    pub default_groups: HashMap<String, String>,
    /// Volume ID to attached instance IDs
    pub volumes: BTreeMap<String, Vec<String>>,

    pub users: BTreeMap<String, FakePrincipal>,
    pub roles: BTreeMap<String, FakePrincipal>,
    pub policies: BTreeMap<String, FakePolicy>,
    /// Group name to attached policy ARNs
    pub groups: BTreeMap<String, Vec<String>>,

    pub rest_apis: BTreeSet<String>,
    pub stages: BTreeSet<(String, String)>,
    pub usage_plans: BTreeMap<String, Vec<ApiStage>>,
    pub api_keys: BTreeSet<String>,
    pub mappings: Vec<FakeMapping>,

    /// Key ID to key state
    pub kms_keys: BTreeMap<String, String>,
    pub functions: BTreeSet<String>,
    /// Bucket name to object keys
    pub buckets: BTreeMap<String, Vec<String>>,
    pub parameters: BTreeSet<String>,

    /// Tagging API index, in insertion order
    pub tagged: Vec<(String, Tags)>,

    /// Every mutating call made, as `"<operation> <args...>"`
    pub call_log: Vec<String>,
    /// Mutating operations that always return the given outcome
    pub failing_ops: HashMap<String, ApiOutcome>,
    /// Read operations that always fail with the given error
    pub failing_reads: HashMap<String, AwsError>,
    /// Services the factory refuses to build clients for
    pub unavailable: HashSet<String>,
}

/// Shared handle to a [`CloudState`]. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

fn not_found(code: &str, what: &str) -> AwsError {
    classify_aws_error(Some(code), Some(format!("{what} does not exist").as_str()))
}

fn rejected(status: u16, code: &str, message: &str) -> ApiOutcome {
    ApiOutcome::failed(status, ApiErrorDetail::new(code, message))
}

fn tags_of(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Modify the state directly
    pub fn edit(&self, f: impl FnOnce(&mut CloudState)) {
        f(&mut *self.lock());
    }

    /// Read the state
    pub fn inspect<R>(&self, f: impl FnOnce(&CloudState) -> R) -> R {
        f(&*self.lock())
    }

    pub fn call_log(&self) -> Vec<String> {
        self.lock().call_log.clone()
    }

    /// Number of mutating calls made so far
    pub fn mutation_count(&self) -> usize {
        self.lock().call_log.len()
    }

    /// Number of calls made to one mutating operation
    pub fn calls(&self, operation: &str) -> usize {
        self.lock()
            .call_log
            .iter()
            .filter(|entry| entry.split(' ').next() == Some(operation))
            .count()
    }

    pub fn fail_op(&self, operation: &str, outcome: ApiOutcome) {
        self.lock().failing_ops.insert(operation.to_string(), outcome);
    }

    pub fn fail_read(&self, operation: &str, error: AwsError) {
        self.lock().failing_reads.insert(operation.to_string(), error);
    }

    pub fn make_unavailable(&self, service: &str) {
        self.lock().unavailable.insert(service.to_string());
    }

    // Fixture builders

    /// Running instance with a root volume plus the given data volumes
    pub fn add_instance(&self, id: &str, vpc_id: &str, groups: &[&str], data_volumes: &[&str]) {
        let root_volume = format!("vol-root-{id}");
        let mut block_devices = vec![BlockDevice {
            volume_id: root_volume.clone(),
            device: "/dev/xvda".to_string(),
            delete_on_termination: true,
        }];
        block_devices.extend(data_volumes.iter().enumerate().map(|(i, v)| BlockDevice {
            volume_id: v.to_string(),
            device: format!("/dev/sd{}", (b'f' + i as u8) as char),
            delete_on_termination: false,
        }));

        self.edit(|s| {
            for group in groups {
                s.security_groups.insert(group.to_string());
            }
            s.volumes.insert(root_volume, vec![id.to_string()]);
            for volume in data_volumes {
                s.volumes.entry(volume.to_string()).or_default().push(id.to_string());
            }
            s.instances.insert(
                id.to_string(),
                InstanceInfo {
                    instance_id: id.to_string(),
                    state: "running".to_string(),
                    vpc_id: Some(vpc_id.to_string()),
                    root_device: Some("/dev/xvda".to_string()),
                    security_groups: groups.iter().map(|g| g.to_string()).collect(),
                    block_devices,
                },
            );
        });
    }

    pub fn add_default_group(&self, vpc_id: &str, group_id: &str) {
        self.edit(|s| {
            s.security_groups.insert(group_id.to_string());
            s.default_groups.insert(vpc_id.to_string(), group_id.to_string());
        });
    }

    pub fn add_security_group(&self, id: &str) {
        self.edit(|s| {
            s.security_groups.insert(id.to_string());
        });
    }

    pub fn add_volume(&self, id: &str) {
        self.edit(|s| {
            s.volumes.entry(id.to_string()).or_default();
        });
    }

    pub fn add_user(&self, name: &str, user: FakePrincipal) {
        self.edit(|s| {
            s.users.insert(name.to_string(), user);
        });
    }

    pub fn add_role(&self, name: &str, role: FakePrincipal) {
        self.edit(|s| {
            s.roles.insert(name.to_string(), role);
        });
    }

    /// Policy with a default `v1` plus the given older versions
    pub fn add_policy(&self, arn: &str, older_versions: &[&str], tags: &[(&str, &str)]) {
        let mut versions = vec![PolicyVersion {
            version_id: "v1".to_string(),
            is_default: true,
        }];
        versions.extend(older_versions.iter().map(|v| PolicyVersion {
            version_id: v.to_string(),
            is_default: false,
        }));
        self.edit(|s| {
            s.policies.insert(
                arn.to_string(),
                FakePolicy {
                    versions,
                    tags: tags_of(tags),
                },
            );
        });
    }

    pub fn add_bucket(&self, name: &str, keys: &[&str]) {
        self.edit(|s| {
            s.buckets
                .insert(name.to_string(), keys.iter().map(|k| k.to_string()).collect());
        });
    }

    pub fn add_kms_key(&self, id: &str) {
        self.edit(|s| {
            s.kms_keys.insert(id.to_string(), "Enabled".to_string());
        });
    }

    pub fn add_function(&self, name: &str) {
        self.edit(|s| {
            s.functions.insert(name.to_string());
        });
    }

    pub fn add_parameter(&self, name: &str) {
        self.edit(|s| {
            s.parameters.insert(name.to_string());
        });
    }

    pub fn add_rest_api(&self, id: &str) {
        self.edit(|s| {
            s.rest_apis.insert(id.to_string());
        });
    }

    pub fn add_stage(&self, api_id: &str, stage: &str) {
        self.edit(|s| {
            s.stages.insert((api_id.to_string(), stage.to_string()));
        });
    }

    pub fn add_usage_plan(&self, id: &str, stages: &[(&str, &str)]) {
        let stages = stages
            .iter()
            .map(|(api, stage)| ApiStage {
                api_id: api.to_string(),
                stage: stage.to_string(),
            })
            .collect();
        self.edit(|s| {
            s.usage_plans.insert(id.to_string(), stages);
        });
    }

    pub fn add_api_key(&self, id: &str) {
        self.edit(|s| {
            s.api_keys.insert(id.to_string());
        });
    }

    pub fn add_mapping(&self, domain: &str, base_path: &str, api_id: &str, stage: Option<&str>) {
        self.edit(|s| {
            s.mappings.push(FakeMapping {
                domain: domain.to_string(),
                base_path: base_path.to_string(),
                api_id: api_id.to_string(),
                stage: stage.map(str::to_string),
            });
        });
    }

    /// Index an ARN in the tagging API
    pub fn tag(&self, arn: &str, key: &str, value: &str) {
        self.edit(|s| match s.tagged.iter_mut().find(|(a, _)| a == arn) {
            Some((_, tags)) => tags.push((key.to_string(), value.to_string())),
            None => s.tagged.push((arn.to_string(), tags_of(&[(key, value)]))),
        });
    }

    // Call plumbing

    fn read<T>(&self, operation: &str, f: impl FnOnce(&CloudState) -> Result<T, AwsError>) -> Result<T, AwsError> {
        let state = self.lock();
        if let Some(err) = state.failing_reads.get(operation) {
            return Err(err.clone());
        }
        f(&*state)
    }

    fn mutate(
        &self,
        operation: &str,
        args: &[&str],
        f: impl FnOnce(&mut CloudState) -> ApiOutcome,
    ) -> ApiOutcome {
        let mut state = self.lock();
        let mut entry = operation.to_string();
        for arg in args {
            entry.push(' ');
            entry.push_str(arg);
        }
        state.call_log.push(entry);

        if let Some(outcome) = state.failing_ops.get(operation) {
            return outcome.clone();
        }
        f(&mut *state)
    }

    fn client(&self, service: &str) -> anyhow::Result<FakeCloud> {
        if self.lock().unavailable.contains(service) {
            anyhow::bail!("{} endpoint unreachable", service);
        }
        Ok(self.clone())
    }
}

impl ClientFactory for FakeCloud {
    type Ec2 = FakeCloud;
    type Iam = FakeCloud;
    type ApiGateway = FakeCloud;
    type Kms = FakeCloud;
    type Lambda = FakeCloud;
    type S3 = FakeCloud;
    type Ssm = FakeCloud;
    type Tagging = FakeCloud;

    fn ec2(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("ec2")
    }

    fn iam(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("iam")
    }

    fn apigateway(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("apigateway")
    }

    fn kms(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("kms")
    }

    fn lambda(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("lambda")
    }

    fn s3(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("s3")
    }

    fn ssm(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("ssm")
    }

    fn tagging(&self, _region: &str) -> anyhow::Result<FakeCloud> {
        self.client("tagging")
    }
}

fn live(instance: &InstanceInfo) -> bool {
    !instance.is_terminated()
}

impl Ec2Operations for FakeCloud {
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>, AwsError> {
        self.read("describe_instance", |s| Ok(s.instances.get(instance_id).cloned()))
    }

    async fn default_security_group(&self, vpc_id: Option<&str>) -> Result<Option<String>, AwsError> {
        self.read("default_security_group", |s| {
            Ok(vpc_id.and_then(|vpc| s.default_groups.get(vpc).cloned()))
        })
    }

    async fn instances_with_security_group(&self, group_id: &str) -> Result<Vec<InstanceInfo>, AwsError> {
        self.read("instances_with_security_group", |s| {
            Ok(s.instances
                .values()
                .filter(|i| live(i) && i.security_groups.iter().any(|g| g == group_id))
                .cloned()
                .collect())
        })
    }

    async fn security_group_exists(&self, group_id: &str) -> Result<bool, AwsError> {
        self.read("security_group_exists", |s| Ok(s.security_groups.contains(group_id)))
    }

    async fn volume_attachments(&self, volume_id: &str) -> Result<Option<Vec<String>>, AwsError> {
        self.read("volume_attachments", |s| Ok(s.volumes.get(volume_id).cloned()))
    }

    async fn set_instance_security_groups(&self, instance_id: &str, group_ids: &[String]) -> ApiOutcome {
        let joined = group_ids.join(",");
        self.mutate("set_instance_security_groups", &[instance_id, joined.as_str()], |s| {
            if group_ids.is_empty() {
                return rejected(400, "InvalidParameterValue", "at least one group is required");
            }
            match s.instances.get_mut(instance_id) {
                Some(instance) => {
                    instance.security_groups = group_ids.to_vec();
                    ApiOutcome::ok()
                }
                None => rejected(400, "InvalidInstanceID.NotFound", "no such instance"),
            }
        })
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> ApiOutcome {
        self.mutate("detach_volume", &[volume_id, instance_id], |s| {
            let Some(attached) = s.volumes.get_mut(volume_id) else {
                return rejected(400, "InvalidVolume.NotFound", "no such volume");
            };
            if !attached.iter().any(|i| i == instance_id) {
                return rejected(400, "IncorrectState", "volume is not attached to the instance");
            }
            attached.retain(|i| i != instance_id);
            if let Some(instance) = s.instances.get_mut(instance_id) {
                instance.block_devices.retain(|d| d.volume_id != volume_id);
            }
            ApiOutcome::ok()
        })
    }

    async fn terminate_instance(&self, instance_id: &str) -> ApiOutcome {
        self.mutate("terminate_instance", &[instance_id], |s| {
            let Some(instance) = s.instances.get_mut(instance_id) else {
                return rejected(400, "InvalidInstanceID.NotFound", "no such instance");
            };
            instance.state = "terminated".to_string();
            for device in std::mem::take(&mut instance.block_devices) {
                if device.delete_on_termination {
                    s.volumes.remove(&device.volume_id);
                } else if let Some(attached) = s.volumes.get_mut(&device.volume_id) {
                    attached.retain(|i| i != instance_id);
                }
            }
            ApiOutcome::ok()
        })
    }

    async fn delete_security_group(&self, group_id: &str) -> ApiOutcome {
        self.mutate("delete_security_group", &[group_id], |s| {
            if !s.security_groups.contains(group_id) {
                return rejected(400, "InvalidGroup.NotFound", "no such group");
            }
            let in_use = s
                .instances
                .values()
                .any(|i| live(i) && i.security_groups.iter().any(|g| g == group_id));
            if in_use {
                return rejected(400, "DependencyViolation", "group is in use");
            }
            s.security_groups.remove(group_id);
            ApiOutcome::ok()
        })
    }

    async fn delete_volume(&self, volume_id: &str) -> ApiOutcome {
        self.mutate("delete_volume", &[volume_id], |s| match s.volumes.get(volume_id) {
            None => rejected(400, "InvalidVolume.NotFound", "no such volume"),
            Some(attached) if !attached.is_empty() => rejected(400, "VolumeInUse", "volume is attached"),
            Some(_) => {
                s.volumes.remove(volume_id);
                ApiOutcome::ok()
            }
        })
    }
}

fn principal(p: &FakePrincipal, name: &str) -> Principal {
    Principal {
        name: name.to_string(),
        permissions_boundary: p.permissions_boundary.clone(),
    }
}

fn iam_arn(kind: &str, name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT}:{kind}/{name}")
}

/// Apply `f` to a user or role, or reject with NoSuchEntity
fn with_principal(
    principals: &mut BTreeMap<String, FakePrincipal>,
    name: &str,
    f: impl FnOnce(&mut FakePrincipal) -> ApiOutcome,
) -> ApiOutcome {
    match principals.get_mut(name) {
        Some(p) => f(p),
        None => rejected(404, "NoSuchEntity", "entity does not exist"),
    }
}

/// Remove `item` from `list`, or reject with NoSuchEntity
fn remove_item(list: &mut Vec<String>, item: &str) -> ApiOutcome {
    let before = list.len();
    list.retain(|x| x != item);
    if list.len() == before {
        rejected(404, "NoSuchEntity", "not attached")
    } else {
        ApiOutcome::ok()
    }
}

impl IamOperations for FakeCloud {
    async fn get_user(&self, user: &str) -> Result<Option<Principal>, AwsError> {
        self.read("get_user", |s| Ok(s.users.get(user).map(|p| principal(p, user))))
    }

    async fn get_role(&self, role: &str) -> Result<Option<Principal>, AwsError> {
        self.read("get_role", |s| Ok(s.roles.get(role).map(|p| principal(p, role))))
    }

    async fn policy_exists(&self, policy_arn: &str) -> Result<bool, AwsError> {
        self.read("policy_exists", |s| Ok(s.policies.contains_key(policy_arn)))
    }

    async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_attached_user_policies", |s| {
            s.users
                .get(user)
                .map(|p| p.attached_policies.clone())
                .ok_or_else(|| not_found("NoSuchEntity", user))
        })
    }

    async fn list_user_policies(&self, user: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_user_policies", |s| {
            s.users
                .get(user)
                .map(|p| p.inline_policies.clone())
                .ok_or_else(|| not_found("NoSuchEntity", user))
        })
    }

    async fn list_access_keys(&self, user: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_access_keys", |s| {
            s.users
                .get(user)
                .map(|p| p.access_keys.clone())
                .ok_or_else(|| not_found("NoSuchEntity", user))
        })
    }

    async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_attached_role_policies", |s| {
            s.roles
                .get(role)
                .map(|p| p.attached_policies.clone())
                .ok_or_else(|| not_found("NoSuchEntity", role))
        })
    }

    async fn list_role_policies(&self, role: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_role_policies", |s| {
            s.roles
                .get(role)
                .map(|p| p.inline_policies.clone())
                .ok_or_else(|| not_found("NoSuchEntity", role))
        })
    }

    async fn list_instance_profiles_for_role(&self, role: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_instance_profiles_for_role", |s| {
            s.roles
                .get(role)
                .map(|p| p.instance_profiles.clone())
                .ok_or_else(|| not_found("NoSuchEntity", role))
        })
    }

    async fn list_entities_for_policy(&self, policy_arn: &str) -> Result<PolicyEntities, AwsError> {
        self.read("list_entities_for_policy", |s| {
            let attached = |p: &FakePrincipal| p.attached_policies.iter().any(|a| a == policy_arn);
            Ok(PolicyEntities {
                users: s
                    .users
                    .iter()
                    .filter(|(_, p)| attached(p))
                    .map(|(n, _)| n.clone())
                    .collect(),
                groups: s
                    .groups
                    .iter()
                    .filter(|(_, policies)| policies.iter().any(|a| a == policy_arn))
                    .map(|(n, _)| n.clone())
                    .collect(),
                roles: s
                    .roles
                    .iter()
                    .filter(|(_, p)| attached(p))
                    .map(|(n, _)| n.clone())
                    .collect(),
            })
        })
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> Result<Vec<PolicyVersion>, AwsError> {
        self.read("list_policy_versions", |s| {
            s.policies
                .get(policy_arn)
                .map(|p| p.versions.clone())
                .ok_or_else(|| not_found("NoSuchEntity", policy_arn))
        })
    }

    async fn list_users(&self) -> Result<Vec<IamEntity>, AwsError> {
        self.read("list_users", |s| {
            Ok(s.users
                .keys()
                .map(|n| IamEntity {
                    name: n.clone(),
                    arn: iam_arn("user", n),
                })
                .collect())
        })
    }

    async fn list_roles(&self) -> Result<Vec<IamEntity>, AwsError> {
        self.read("list_roles", |s| {
            Ok(s.roles
                .keys()
                .map(|n| IamEntity {
                    name: n.clone(),
                    arn: iam_arn("role", n),
                })
                .collect())
        })
    }

    async fn list_local_policies(&self) -> Result<Vec<IamEntity>, AwsError> {
        self.read("list_local_policies", |s| {
            Ok(s.policies
                .keys()
                .map(|arn| IamEntity {
                    name: arn.clone(),
                    arn: arn.clone(),
                })
                .collect())
        })
    }

    async fn user_tags(&self, user: &str) -> Result<Tags, AwsError> {
        self.read("user_tags", |s| {
            s.users
                .get(user)
                .map(|p| p.tags.clone())
                .ok_or_else(|| not_found("NoSuchEntity", user))
        })
    }

    async fn role_tags(&self, role: &str) -> Result<Tags, AwsError> {
        self.read("role_tags", |s| {
            s.roles
                .get(role)
                .map(|p| p.tags.clone())
                .ok_or_else(|| not_found("NoSuchEntity", role))
        })
    }

    async fn policy_tags(&self, policy_arn: &str) -> Result<Tags, AwsError> {
        self.read("policy_tags", |s| {
            s.policies
                .get(policy_arn)
                .map(|p| p.tags.clone())
                .ok_or_else(|| not_found("NoSuchEntity", policy_arn))
        })
    }

    async fn delete_user_permissions_boundary(&self, user: &str) -> ApiOutcome {
        self.mutate("delete_user_permissions_boundary", &[user], |s| {
            with_principal(&mut s.users, user, |p| {
                p.permissions_boundary = None;
                ApiOutcome::ok()
            })
        })
    }

    async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> ApiOutcome {
        self.mutate("detach_user_policy", &[user, policy_arn], |s| {
            with_principal(&mut s.users, user, |p| remove_item(&mut p.attached_policies, policy_arn))
        })
    }

    async fn delete_user_policy(&self, user: &str, policy_name: &str) -> ApiOutcome {
        self.mutate("delete_user_policy", &[user, policy_name], |s| {
            with_principal(&mut s.users, user, |p| remove_item(&mut p.inline_policies, policy_name))
        })
    }

    async fn delete_access_key(&self, user: &str, access_key_id: &str) -> ApiOutcome {
        self.mutate("delete_access_key", &[user, access_key_id], |s| {
            with_principal(&mut s.users, user, |p| remove_item(&mut p.access_keys, access_key_id))
        })
    }

    async fn delete_user(&self, user: &str) -> ApiOutcome {
        self.mutate("delete_user", &[user], |s| {
            let outcome = with_principal(&mut s.users, user, |p| {
                if p.attached_policies.is_empty() && p.inline_policies.is_empty() && p.access_keys.is_empty() {
                    ApiOutcome::ok()
                } else {
                    rejected(409, "DeleteConflict", "user still has policies or keys")
                }
            });
            if outcome.is_accepted() {
                s.users.remove(user);
            }
            outcome
        })
    }

    async fn delete_role_permissions_boundary(&self, role: &str) -> ApiOutcome {
        self.mutate("delete_role_permissions_boundary", &[role], |s| {
            with_principal(&mut s.roles, role, |p| {
                p.permissions_boundary = None;
                ApiOutcome::ok()
            })
        })
    }

    async fn delete_role_policy(&self, role: &str, policy_name: &str) -> ApiOutcome {
        self.mutate("delete_role_policy", &[role, policy_name], |s| {
            with_principal(&mut s.roles, role, |p| remove_item(&mut p.inline_policies, policy_name))
        })
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> ApiOutcome {
        self.mutate("detach_role_policy", &[role, policy_arn], |s| {
            with_principal(&mut s.roles, role, |p| remove_item(&mut p.attached_policies, policy_arn))
        })
    }

    async fn remove_role_from_instance_profile(&self, profile: &str, role: &str) -> ApiOutcome {
        self.mutate("remove_role_from_instance_profile", &[profile, role], |s| {
            with_principal(&mut s.roles, role, |p| remove_item(&mut p.instance_profiles, profile))
        })
    }

    async fn delete_role(&self, role: &str) -> ApiOutcome {
        self.mutate("delete_role", &[role], |s| {
            let outcome = with_principal(&mut s.roles, role, |p| {
                if p.attached_policies.is_empty()
                    && p.inline_policies.is_empty()
                    && p.instance_profiles.is_empty()
                {
                    ApiOutcome::ok()
                } else {
                    rejected(409, "DeleteConflict", "role still has policies or profiles")
                }
            });
            if outcome.is_accepted() {
                s.roles.remove(role);
            }
            outcome
        })
    }

    async fn detach_group_policy(&self, group: &str, policy_arn: &str) -> ApiOutcome {
        self.mutate("detach_group_policy", &[group, policy_arn], |s| match s.groups.get_mut(group) {
            Some(policies) => remove_item(policies, policy_arn),
            None => rejected(404, "NoSuchEntity", "group does not exist"),
        })
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> ApiOutcome {
        self.mutate("delete_policy_version", &[policy_arn, version_id], |s| {
            let Some(policy) = s.policies.get_mut(policy_arn) else {
                return rejected(404, "NoSuchEntity", "policy does not exist");
            };
            match policy.versions.iter().position(|v| v.version_id == version_id) {
                Some(i) if policy.versions[i].is_default => {
                    rejected(409, "DeleteConflict", "cannot delete the default version")
                }
                Some(i) => {
                    policy.versions.remove(i);
                    ApiOutcome::ok()
                }
                None => rejected(404, "NoSuchEntity", "version does not exist"),
            }
        })
    }

    async fn delete_policy(&self, policy_arn: &str) -> ApiOutcome {
        self.mutate("delete_policy", &[policy_arn], |s| {
            let Some(policy) = s.policies.get(policy_arn) else {
                return rejected(404, "NoSuchEntity", "policy does not exist");
            };
            let attached = s
                .users
                .values()
                .chain(s.roles.values())
                .any(|p| p.attached_policies.iter().any(|a| a == policy_arn))
                || s.groups.values().any(|g| g.iter().any(|a| a == policy_arn));
            if attached || policy.versions.len() > 1 {
                return rejected(409, "DeleteConflict", "policy is attached or has versions");
            }
            s.policies.remove(policy_arn);
            ApiOutcome::ok()
        })
    }
}

impl ApiGatewayOperations for FakeCloud {
    async fn rest_api_exists(&self, api_id: &str) -> Result<bool, AwsError> {
        self.read("rest_api_exists", |s| Ok(s.rest_apis.contains(api_id)))
    }

    async fn stage_exists(&self, api_id: &str, stage: &str) -> Result<bool, AwsError> {
        self.read("stage_exists", |s| {
            Ok(s.stages.contains(&(api_id.to_string(), stage.to_string())))
        })
    }

    async fn api_key_exists(&self, key_id: &str) -> Result<bool, AwsError> {
        self.read("api_key_exists", |s| Ok(s.api_keys.contains(key_id)))
    }

    async fn usage_plan_stages(&self, plan_id: &str) -> Result<Option<Vec<ApiStage>>, AwsError> {
        self.read("usage_plan_stages", |s| Ok(s.usage_plans.get(plan_id).cloned()))
    }

    async fn base_path_mappings(
        &self,
        api_id: &str,
        stage: Option<&str>,
    ) -> Result<Vec<BasePathMapping>, AwsError> {
        self.read("base_path_mappings", |s| {
            Ok(s.mappings
                .iter()
                .filter(|m| m.api_id == api_id && (stage.is_none() || m.stage.as_deref() == stage))
                .map(|m| BasePathMapping {
                    domain: m.domain.clone(),
                    base_path: m.base_path.clone(),
                })
                .collect())
        })
    }

    async fn delete_base_path_mapping(&self, domain: &str, base_path: &str) -> ApiOutcome {
        self.mutate("delete_base_path_mapping", &[domain, base_path], |s| {
            let before = s.mappings.len();
            s.mappings
                .retain(|m| !(m.domain == domain && m.base_path == base_path));
            if s.mappings.len() == before {
                rejected(404, "NotFoundException", "mapping does not exist")
            } else {
                ApiOutcome::with_status(202)
            }
        })
    }

    async fn delete_rest_api(&self, api_id: &str) -> ApiOutcome {
        self.mutate("delete_rest_api", &[api_id], |s| {
            if s.mappings.iter().any(|m| m.api_id == api_id) {
                return rejected(400, "BadRequestException", "API has base path mappings");
            }
            if s.rest_apis.remove(api_id) {
                s.stages.retain(|(api, _)| api != api_id);
                ApiOutcome::with_status(202)
            } else {
                rejected(404, "NotFoundException", "API does not exist")
            }
        })
    }

    async fn delete_stage(&self, api_id: &str, stage: &str) -> ApiOutcome {
        self.mutate("delete_stage", &[api_id, stage], |s| {
            if s.stages.remove(&(api_id.to_string(), stage.to_string())) {
                ApiOutcome::with_status(202)
            } else {
                rejected(404, "NotFoundException", "stage does not exist")
            }
        })
    }

    async fn delete_usage_plan(&self, plan_id: &str) -> ApiOutcome {
        self.mutate("delete_usage_plan", &[plan_id], |s| {
            if s.usage_plans.remove(plan_id).is_some() {
                ApiOutcome::with_status(202)
            } else {
                rejected(404, "NotFoundException", "usage plan does not exist")
            }
        })
    }

    async fn delete_api_key(&self, key_id: &str) -> ApiOutcome {
        self.mutate("delete_api_key", &[key_id], |s| {
            if s.api_keys.remove(key_id) {
                ApiOutcome::with_status(202)
            } else {
                rejected(404, "NotFoundException", "API key does not exist")
            }
        })
    }
}

impl KmsOperations for FakeCloud {
    async fn key_state(&self, key_id: &str) -> Result<Option<String>, AwsError> {
        self.read("key_state", |s| Ok(s.kms_keys.get(key_id).cloned()))
    }

    async fn disable_key(&self, key_id: &str) -> ApiOutcome {
        self.mutate("disable_key", &[key_id], |s| match s.kms_keys.get_mut(key_id) {
            Some(state) if state == "PendingDeletion" => {
                rejected(400, "KMSInvalidStateException", "key is pending deletion")
            }
            Some(state) => {
                *state = "Disabled".to_string();
                ApiOutcome::ok()
            }
            None => rejected(400, "NotFoundException", "key does not exist"),
        })
    }

    async fn schedule_key_deletion(&self, key_id: &str, pending_window_days: i32) -> ApiOutcome {
        let window = pending_window_days.to_string();
        self.mutate("schedule_key_deletion", &[key_id, window.as_str()], |s| {
            if !(7..=30).contains(&pending_window_days) {
                return rejected(400, "ValidationException", "window must be 7-30 days");
            }
            match s.kms_keys.get_mut(key_id) {
                Some(state) => {
                    *state = "PendingDeletion".to_string();
                    ApiOutcome::ok()
                }
                None => rejected(400, "NotFoundException", "key does not exist"),
            }
        })
    }
}

impl LambdaOperations for FakeCloud {
    async fn function_exists(&self, function_name: &str) -> Result<bool, AwsError> {
        self.read("function_exists", |s| Ok(s.functions.contains(function_name)))
    }

    async fn delete_function(&self, function_name: &str) -> ApiOutcome {
        self.mutate("delete_function", &[function_name], |s| {
            if s.functions.remove(function_name) {
                ApiOutcome::with_status(204)
            } else {
                rejected(404, "ResourceNotFoundException", "function does not exist")
            }
        })
    }
}

impl S3Operations for FakeCloud {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, AwsError> {
        self.read("bucket_exists", |s| Ok(s.buckets.contains_key(bucket)))
    }

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>, AwsError> {
        self.read("list_object_keys", |s| {
            s.buckets
                .get(bucket)
                .cloned()
                .ok_or_else(|| not_found("NoSuchBucket", bucket))
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> ApiOutcome {
        let joined = keys.join(",");
        self.mutate("delete_objects", &[bucket, joined.as_str()], |s| match s.buckets.get_mut(bucket) {
            Some(objects) => {
                objects.retain(|k| !keys.contains(k));
                ApiOutcome::ok()
            }
            None => rejected(404, "NoSuchBucket", "bucket does not exist"),
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiOutcome {
        self.mutate("delete_bucket", &[bucket], |s| match s.buckets.get(bucket) {
            Some(objects) if !objects.is_empty() => rejected(409, "BucketNotEmpty", "bucket is not empty"),
            Some(_) => {
                s.buckets.remove(bucket);
                ApiOutcome::with_status(204)
            }
            None => rejected(404, "NoSuchBucket", "bucket does not exist"),
        })
    }
}

impl SsmOperations for FakeCloud {
    async fn parameter_exists(&self, name: &str) -> Result<bool, AwsError> {
        self.read("parameter_exists", |s| Ok(s.parameters.contains(name)))
    }

    async fn delete_parameter(&self, name: &str) -> ApiOutcome {
        self.mutate("delete_parameter", &[name], |s| {
            if s.parameters.remove(name) {
                ApiOutcome::ok()
            } else {
                rejected(400, "ParameterNotFound", "parameter does not exist")
            }
        })
    }
}

impl TaggingOperations for FakeCloud {
    async fn resources_by_tag(&self, key: &str, value: &str) -> Result<Vec<String>, AwsError> {
        self.read("resources_by_tag", |s| {
            Ok(s.tagged
                .iter()
                .filter(|(_, tags)| tags.iter().any(|(k, v)| k == key && v == value))
                .map(|(arn, _)| arn.clone())
                .collect())
        })
    }
}
