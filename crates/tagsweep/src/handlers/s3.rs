//! S3 buckets
//!
//! A bucket must be empty before it can be deleted. All objects are removed
//! in one aggregated step whose report lists every key.

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, S3Operations};
use tagsweep_common::{Action, Arn, ResourceKind};

pub struct Bucket;

impl<F: ClientFactory> ResourceHandler<F> for Bucket {
    const KIND: ResourceKind = ResourceKind::S3Bucket;

    type Client = F::S3;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::S3> {
        factory.s3(region)
    }

    /// `arn:aws:s3:::<bucket>`
    fn resource_id(arn: &Arn) -> String {
        arn.resource().to_string()
    }

    async fn query(client: &F::S3, arn: &Arn) -> Result<bool, AwsError> {
        client.bucket_exists(arn.resource()).await
    }

    async fn teardown(client: &F::S3, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let bucket = arn.resource();
        let keys = steps.listed(client.list_object_keys(bucket).await, "objects", "bucket", bucket);

        if !keys.is_empty() {
            let keys = keys.as_slice();
            steps
                .mutate(Action::delete("objects", keys.join(" | ")), || {
                    client.delete_objects(bucket, keys)
                })
                .await;
        }

        steps
            .mutate(Action::delete("bucket", bucket), || client.delete_bucket(bucket))
            .await;
        Ok(())
    }
}
