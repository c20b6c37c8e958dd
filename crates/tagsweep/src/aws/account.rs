//! AWS account validation and identity

use super::context::AwsContext;
use anyhow::{Context, Result};
use tracing::info;

/// Strongly-typed AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Whether an ARN belongs to this account. ARNs without an account field
    /// (S3 buckets) always match.
    pub fn owns(&self, arn_account: &str) -> bool {
        arn_account.is_empty() || arn_account == self.0
    }
}

/// Fetch the current AWS account ID via STS GetCallerIdentity.
///
/// This requires no special permissions, so it doubles as a credential check
/// before any resource is touched.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, "AWS account validated");

    Ok(AccountId(account.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owns_matching_and_accountless_arns() {
        let id = AccountId("123456789012".to_string());
        assert!(id.owns("123456789012"));
        assert!(id.owns(""));
        assert!(!id.owns("210987654321"));
        assert_eq!(id.len(), 12);
        assert_eq!(id.to_string(), "123456789012");
    }
}
