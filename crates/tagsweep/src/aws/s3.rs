//! S3 bucket operations

use super::context::AwsContext;
use super::error::{AwsError, classify_sdk_error, ignore_not_found, outcome_of};
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::future::Future;
use tagsweep_common::defaults::S3_DELETE_BATCH_SIZE;
use tagsweep_common::{ApiErrorDetail, ApiOutcome};
use tracing::{debug, warn};

pub trait S3Operations: Send + Sync {
    fn bucket_exists(&self, bucket: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// Every object key in the bucket
    fn list_object_keys(&self, bucket: &str) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    /// Delete the given keys. Accepted only if every key was deleted.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> impl Future<Output = ApiOutcome> + Send;

    fn delete_bucket(&self, bucket: &str) -> impl Future<Output = ApiOutcome> + Send;
}

/// S3 client
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.s3_client(region),
        }
    }
}

impl S3Operations for S3Client {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, AwsError> {
        let response = ignore_not_found(self.client.head_bucket().bucket(bucket).send().await)?;
        Ok(response.is_some())
    }

    async fn list_object_keys(&self, bucket: &str) -> Result<Vec<String>, AwsError> {
        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        debug!(bucket = %bucket, count = keys.len(), "Listed bucket objects");
        Ok(keys)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> ApiOutcome {
        let mut failed = Vec::new();

        for chunk in keys.chunks(S3_DELETE_BATCH_SIZE) {
            let objects: Result<Vec<_>, _> = chunk
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect();
            let delete = match objects.and_then(|o| Delete::builder().set_objects(Some(o)).quiet(true).build()) {
                Ok(delete) => delete,
                Err(e) => {
                    return ApiOutcome::failed(0, ApiErrorDetail::new("InvalidRequest", e.to_string()));
                }
            };

            let result = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await;
            match result {
                Ok(output) => failed.extend(output.errors().iter().cloned()),
                Err(e) => return outcome_of::<(), _>(Err(e)),
            }
        }

        match failed.first() {
            None => ApiOutcome::ok(),
            Some(first) => {
                warn!(bucket = %bucket, failed = failed.len(), "Some objects could not be deleted");
                ApiOutcome::failed(
                    0,
                    ApiErrorDetail::new(
                        first.code().unwrap_or("Unknown"),
                        format!(
                            "{} of {} objects not deleted; first: {}: {}",
                            failed.len(),
                            keys.len(),
                            first.key().unwrap_or_default(),
                            first.message().unwrap_or_default()
                        ),
                    ),
                )
            }
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiOutcome {
        outcome_of(self.client.delete_bucket().bucket(bucket).send().await)
    }
}
