//! KMS keys
//!
//! Keys cannot be deleted outright: they are disabled, then scheduled for
//! deletion after the configured pending window.

use super::{Precondition, ResourceHandler, Steps};
use crate::aws::{AwsError, ClientFactory, KmsOperations};
use tagsweep_common::{Action, Arn, ResourceKind};

/// States in which the key is already on its way out
const DELETING_STATES: &[&str] = &["PendingDeletion", "PendingReplicaDeletion"];

pub struct Key;

impl<F: ClientFactory> ResourceHandler<F> for Key {
    const KIND: ResourceKind = ResourceKind::KmsKey;

    type Client = F::Kms;

    fn client(factory: &F, region: &str) -> anyhow::Result<F::Kms> {
        factory.kms(region)
    }

    async fn query(client: &F::Kms, arn: &Arn) -> Result<bool, AwsError> {
        let state = client.key_state(arn.resource_id()).await?;
        Ok(state.is_some_and(|s| !DELETING_STATES.contains(&s.as_str())))
    }

    async fn teardown(client: &F::Kms, arn: &Arn, steps: &mut Steps<'_>) -> Result<(), Precondition> {
        let key_id = arn.resource_id();
        let window = steps.context().kms_pending_window_days;

        steps
            .mutate(Action::disable("key", key_id), || client.disable_key(key_id))
            .await;
        steps
            .mutate(Action::delete("key", key_id), || {
                client.schedule_key_deletion(key_id, window)
            })
            .await;
        Ok(())
    }
}
