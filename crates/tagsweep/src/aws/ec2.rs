//! EC2 operations: instances, security groups and EBS volumes

use super::context::AwsContext;
use super::error::{AwsError, classify_sdk_error, ignore_not_found, outcome_of};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Filter, Instance};
use std::future::Future;
use tagsweep_common::ApiOutcome;
use tracing::debug;

/// Instance states that still hold attachments
const LIVE_INSTANCE_STATES: &[&str] = &["pending", "running", "shutting-down", "stopping", "stopped"];

/// A block device mapped into an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub volume_id: String,
    pub device: String,
    pub delete_on_termination: bool,
}

/// The parts of an instance description teardown needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub state: String,
    pub vpc_id: Option<String>,
    pub root_device: Option<String>,
    pub security_groups: Vec<String>,
    pub block_devices: Vec<BlockDevice>,
}

impl InstanceInfo {
    pub fn is_terminated(&self) -> bool {
        self.state == "terminated"
    }

    /// Volumes that would survive termination: not the root device and not
    /// flagged delete-on-termination.
    pub fn detachable_volumes(&self) -> impl Iterator<Item = &BlockDevice> {
        self.block_devices.iter().filter(move |d| {
            !d.delete_on_termination && self.root_device.as_deref() != Some(d.device.as_str())
        })
    }
}

/// EC2 calls used by the instance, security group and volume handlers.
///
/// Reads map not-found to `None`; mutations report an [`ApiOutcome`].
pub trait Ec2Operations: Send + Sync {
    fn describe_instance(
        &self,
        instance_id: &str,
    ) -> impl Future<Output = Result<Option<InstanceInfo>, AwsError>> + Send;

    /// ID of the security group named `default` in the given VPC
    fn default_security_group(
        &self,
        vpc_id: Option<&str>,
    ) -> impl Future<Output = Result<Option<String>, AwsError>> + Send;

    /// Non-terminated instances that have the group attached
    fn instances_with_security_group(
        &self,
        group_id: &str,
    ) -> impl Future<Output = Result<Vec<InstanceInfo>, AwsError>> + Send;

    fn security_group_exists(
        &self,
        group_id: &str,
    ) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// Instance IDs the volume is attached to, or `None` if the volume is gone
    fn volume_attachments(
        &self,
        volume_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, AwsError>> + Send;

    /// Replace the full set of security groups on an instance
    fn set_instance_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
    ) -> impl Future<Output = ApiOutcome> + Send;

    fn detach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
    ) -> impl Future<Output = ApiOutcome> + Send;

    fn terminate_instance(&self, instance_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_security_group(&self, group_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_volume(&self, volume_id: &str) -> impl Future<Output = ApiOutcome> + Send;
}

/// EC2 client scoped to one region
#[derive(Debug, Clone)]
pub struct Ec2Client {
    client: Client,
}

impl Ec2Client {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.ec2_client(region),
        }
    }
}

fn instance_info(instance: &Instance) -> InstanceInfo {
    InstanceInfo {
        instance_id: instance.instance_id().unwrap_or_default().to_string(),
        state: instance
            .state()
            .and_then(|s| s.name())
            .map(|n| n.as_str().to_string())
            .unwrap_or_default(),
        vpc_id: instance.vpc_id().map(str::to_string),
        root_device: instance.root_device_name().map(str::to_string),
        security_groups: instance
            .security_groups()
            .iter()
            .filter_map(|g| g.group_id().map(str::to_string))
            .collect(),
        block_devices: instance
            .block_device_mappings()
            .iter()
            .filter_map(|m| {
                let ebs = m.ebs()?;
                Some(BlockDevice {
                    volume_id: ebs.volume_id()?.to_string(),
                    device: m.device_name().unwrap_or_default().to_string(),
                    delete_on_termination: ebs.delete_on_termination().unwrap_or(false),
                })
            })
            .collect(),
    }
}

impl Ec2Operations for Ec2Client {
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceInfo>, AwsError> {
        let response = ignore_not_found(
            self.client
                .describe_instances()
                .instance_ids(instance_id)
                .send()
                .await,
        )?;

        Ok(response.and_then(|r| {
            r.reservations()
                .iter()
                .flat_map(|res| res.instances())
                .next()
                .map(instance_info)
        }))
    }

    async fn default_security_group(&self, vpc_id: Option<&str>) -> Result<Option<String>, AwsError> {
        let mut request = self
            .client
            .describe_security_groups()
            .filters(Filter::builder().name("group-name").values("default").build());
        if let Some(vpc) = vpc_id {
            request = request.filters(Filter::builder().name("vpc-id").values(vpc).build());
        }

        let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;
        let group = response
            .security_groups()
            .iter()
            .find_map(|g| g.group_id().map(str::to_string));

        debug!(vpc_id = ?vpc_id, group_id = ?group, "Looked up default security group");
        Ok(group)
    }

    async fn instances_with_security_group(&self, group_id: &str) -> Result<Vec<InstanceInfo>, AwsError> {
        let mut state_filter = Filter::builder().name("instance-state-name");
        for state in LIVE_INSTANCE_STATES {
            state_filter = state_filter.values(*state);
        }

        let mut pages = self
            .client
            .describe_instances()
            .filters(Filter::builder().name("instance.group-id").values(group_id).build())
            .filters(state_filter.build())
            .into_paginator()
            .send();

        let mut instances = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify_sdk_error(&e))?;
            for reservation in page.reservations() {
                instances.extend(reservation.instances().iter().map(instance_info));
            }
        }

        debug!(group_id = %group_id, count = instances.len(), "Found instances using security group");
        Ok(instances)
    }

    async fn security_group_exists(&self, group_id: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(
            self.client
                .describe_security_groups()
                .group_ids(group_id)
                .send()
                .await,
        )?;
        Ok(response.is_some_and(|r| !r.security_groups().is_empty()))
    }

    async fn volume_attachments(&self, volume_id: &str) -> Result<Option<Vec<String>>, AwsError> {
        let response = ignore_not_found(
            self.client
                .describe_volumes()
                .volume_ids(volume_id)
                .send()
                .await,
        )?;

        Ok(response.and_then(|r| {
            r.volumes().first().map(|v| {
                v.attachments()
                    .iter()
                    .filter_map(|a| a.instance_id().map(str::to_string))
                    .collect()
            })
        }))
    }

    async fn set_instance_security_groups(&self, instance_id: &str, group_ids: &[String]) -> ApiOutcome {
        outcome_of(
            self.client
                .modify_instance_attribute()
                .instance_id(instance_id)
                .set_groups(Some(group_ids.to_vec()))
                .send()
                .await,
        )
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .detach_volume()
                .volume_id(volume_id)
                .instance_id(instance_id)
                .send()
                .await,
        )
    }

    async fn terminate_instance(&self, instance_id: &str) -> ApiOutcome {
        outcome_of(
            self.client
                .terminate_instances()
                .instance_ids(instance_id)
                .send()
                .await,
        )
    }

    async fn delete_security_group(&self, group_id: &str) -> ApiOutcome {
        outcome_of(self.client.delete_security_group().group_id(group_id).send().await)
    }

    async fn delete_volume(&self, volume_id: &str) -> ApiOutcome {
        outcome_of(self.client.delete_volume().volume_id(volume_id).send().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(volume_id: &str, device: &str, delete_on_termination: bool) -> BlockDevice {
        BlockDevice {
            volume_id: volume_id.to_string(),
            device: device.to_string(),
            delete_on_termination,
        }
    }

    #[test]
    fn detachable_volumes_skip_root_and_ephemeral() {
        let info = InstanceInfo {
            instance_id: "i-1".to_string(),
            state: "running".to_string(),
            vpc_id: Some("vpc-1".to_string()),
            root_device: Some("/dev/xvda".to_string()),
            security_groups: vec!["sg-1".to_string()],
            block_devices: vec![
                device("vol-root", "/dev/xvda", false),
                device("vol-scratch", "/dev/sdc", true),
                device("vol-data", "/dev/sdf", false),
            ],
        };

        let ids: Vec<_> = info.detachable_volumes().map(|d| d.volume_id.as_str()).collect();
        assert_eq!(ids, vec!["vol-data"]);
        assert!(!info.is_terminated());
    }
}
