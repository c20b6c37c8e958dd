//! KMS key operations

use super::context::AwsContext;
use super::error::{AwsError, ignore_not_found, outcome_of};
use aws_sdk_kms::Client;
use std::future::Future;
use tagsweep_common::ApiOutcome;

pub trait KmsOperations: Send + Sync {
    /// Current key state (`Enabled`, `PendingDeletion`, ...), or `None` if the key is gone
    fn key_state(&self, key_id: &str) -> impl Future<Output = Result<Option<String>, AwsError>> + Send;

    fn disable_key(&self, key_id: &str) -> impl Future<Output = ApiOutcome> + Send;

    fn schedule_key_deletion(
        &self,
        key_id: &str,
        pending_window_days: i32,
    ) -> impl Future<Output = ApiOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct KmsClient {
    client: Client,
}

impl KmsClient {
    pub fn from_context(ctx: &AwsContext, region: &str) -> Self {
        Self {
            client: ctx.kms_client(region),
        }
    }

    /// Wrap a pre-built SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl KmsOperations for KmsClient {
    async fn key_state(&self, key_id: &str) -> Result<Option<String>, AwsError> {
        let response = ignore_not_found(self.client.describe_key().key_id(key_id).send().await)?;
        Ok(response.and_then(|r| {
            r.key_metadata()
                .and_then(|m| m.key_state())
                .map(|s| s.as_str().to_string())
        }))
    }

    async fn disable_key(&self, key_id: &str) -> ApiOutcome {
        outcome_of(self.client.disable_key().key_id(key_id).send().await)
    }

    async fn schedule_key_deletion(&self, key_id: &str, pending_window_days: i32) -> ApiOutcome {
        outcome_of(
            self.client
                .schedule_key_deletion()
                .key_id(key_id)
                .pending_window_in_days(pending_window_days)
                .send()
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_kms::error::ErrorMetadata;
    use aws_sdk_kms::operation::describe_key::{DescribeKeyError, DescribeKeyOutput};
    use aws_sdk_kms::operation::disable_key::{DisableKeyError, DisableKeyOutput};
    use aws_sdk_kms::operation::schedule_key_deletion::ScheduleKeyDeletionOutput;
    use aws_sdk_kms::types::error::{KmsInvalidStateException, NotFoundException};
    use aws_sdk_kms::types::{KeyMetadata, KeyState};
    use aws_smithy_mocks::{mock, mock_client};

    const KEY_ID: &str = "1234abcd-12ab-34cd-56ef-1234567890ab";

    #[tokio::test]
    async fn key_state_reads_metadata() {
        let rule = mock!(aws_sdk_kms::Client::describe_key)
            .match_requests(|req| req.key_id() == Some(KEY_ID))
            .then_output(|| {
                DescribeKeyOutput::builder()
                    .key_metadata(
                        KeyMetadata::builder()
                            .key_id(KEY_ID)
                            .key_state(KeyState::PendingDeletion)
                            .build()
                            .unwrap(),
                    )
                    .build()
            });
        let kms = KmsClient::new(mock_client!(aws_sdk_kms, [&rule]));

        let state = kms.key_state(KEY_ID).await.unwrap();
        assert_eq!(state.as_deref(), Some("PendingDeletion"));
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let rule = mock!(aws_sdk_kms::Client::describe_key).then_error(|| {
            DescribeKeyError::NotFoundException(
                NotFoundException::builder()
                    .message("Key does not exist")
                    .meta(ErrorMetadata::builder().code("NotFoundException").build())
                    .build(),
            )
        });
        let kms = KmsClient::new(mock_client!(aws_sdk_kms, [&rule]));

        assert_eq!(kms.key_state(KEY_ID).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_disable_is_not_accepted() {
        let rule = mock!(aws_sdk_kms::Client::disable_key).then_error(|| {
            DisableKeyError::KmsInvalidStateException(
                KmsInvalidStateException::builder()
                    .message("Key is pending deletion")
                    .meta(ErrorMetadata::builder().code("KMSInvalidStateException").build())
                    .build(),
            )
        });
        let kms = KmsClient::new(mock_client!(aws_sdk_kms, [&rule]));

        let outcome = kms.disable_key(KEY_ID).await;
        assert!(!outcome.is_accepted());
        assert_eq!(
            outcome.error.map(|e| e.code).as_deref(),
            Some("KMSInvalidStateException")
        );
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn successful_calls_are_accepted() {
        let disable = mock!(aws_sdk_kms::Client::disable_key)
            .then_output(|| DisableKeyOutput::builder().build());
        let schedule = mock!(aws_sdk_kms::Client::schedule_key_deletion)
            .match_requests(|req| req.pending_window_in_days() == Some(7))
            .then_output(|| ScheduleKeyDeletionOutput::builder().key_id(KEY_ID).build());
        let kms = KmsClient::new(mock_client!(aws_sdk_kms, [&disable, &schedule]));

        assert!(kms.disable_key(KEY_ID).await.is_accepted());
        assert!(kms.schedule_key_deletion(KEY_ID, 7).await.is_accepted());
        assert_eq!(schedule.num_calls(), 1);
    }
}
