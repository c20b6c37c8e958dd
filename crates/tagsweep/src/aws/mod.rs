//! AWS collaborators
//!
//! One module per service. Each exposes an `*Operations` trait describing
//! exactly the calls the teardown handlers make, and a client implementing it
//! on top of the AWS SDK:
//! - EC2: instances, security groups, volumes
//! - IAM: users, roles, managed policies
//! - API Gateway: REST APIs, stages, usage plans, API keys, base path mappings
//! - KMS, Lambda, S3, SSM
//! - Resource Groups Tagging: tag discovery
//! - STS: account ID lookup

pub mod account;
pub mod apigateway;
pub mod context;
pub mod ec2;
pub mod error;
pub mod iam;
pub mod kms;
pub mod lambda;
pub mod s3;
pub mod ssm;
pub mod tagging;

pub use account::{AccountId, get_current_account_id};
pub use apigateway::{ApiGatewayClient, ApiGatewayOperations, ApiStage, BasePathMapping};
pub use context::AwsContext;
pub use ec2::{BlockDevice, Ec2Client, Ec2Operations, InstanceInfo};
pub use iam::{IamClient, IamEntity, IamOperations, PolicyEntities, PolicyVersion, Principal, Tags};
pub use kms::{KmsClient, KmsOperations};
pub use lambda::{LambdaClient, LambdaOperations};
pub use s3::{S3Client, S3Operations};
pub use ssm::{SsmClient, SsmOperations};
pub use tagging::{TaggingClient, TaggingOperations};

// Error handling
pub use error::{AwsError, classify_aws_error, classify_sdk_error, ignore_not_found, outcome_of};

use anyhow::Result;

/// Resolves region-scoped collaborators for each service.
///
/// Failing to produce a client is unrecoverable for the run: the orchestrator
/// aborts the whole batch rather than reporting per resource.
pub trait ClientFactory: Send + Sync {
    type Ec2: Ec2Operations;
    type Iam: IamOperations;
    type ApiGateway: ApiGatewayOperations;
    type Kms: KmsOperations;
    type Lambda: LambdaOperations;
    type S3: S3Operations;
    type Ssm: SsmOperations;
    type Tagging: TaggingOperations;

    fn ec2(&self, region: &str) -> Result<Self::Ec2>;
    fn iam(&self, region: &str) -> Result<Self::Iam>;
    fn apigateway(&self, region: &str) -> Result<Self::ApiGateway>;
    fn kms(&self, region: &str) -> Result<Self::Kms>;
    fn lambda(&self, region: &str) -> Result<Self::Lambda>;
    fn s3(&self, region: &str) -> Result<Self::S3>;
    fn ssm(&self, region: &str) -> Result<Self::Ssm>;
    fn tagging(&self, region: &str) -> Result<Self::Tagging>;
}

fn require_region(service: &str, region: &str) -> Result<()> {
    if region.is_empty() {
        anyhow::bail!("No region available for {} client", service);
    }
    Ok(())
}

impl ClientFactory for AwsContext {
    type Ec2 = Ec2Client;
    type Iam = IamClient;
    type ApiGateway = ApiGatewayClient;
    type Kms = KmsClient;
    type Lambda = LambdaClient;
    type S3 = S3Client;
    type Ssm = SsmClient;
    type Tagging = TaggingClient;

    fn ec2(&self, region: &str) -> Result<Ec2Client> {
        require_region("ec2", region)?;
        Ok(Ec2Client::from_context(self, region))
    }

    fn iam(&self, region: &str) -> Result<IamClient> {
        require_region("iam", region)?;
        Ok(IamClient::from_context(self, region))
    }

    fn apigateway(&self, region: &str) -> Result<ApiGatewayClient> {
        require_region("apigateway", region)?;
        Ok(ApiGatewayClient::from_context(self, region))
    }

    fn kms(&self, region: &str) -> Result<KmsClient> {
        require_region("kms", region)?;
        Ok(KmsClient::from_context(self, region))
    }

    fn lambda(&self, region: &str) -> Result<LambdaClient> {
        require_region("lambda", region)?;
        Ok(LambdaClient::from_context(self, region))
    }

    fn s3(&self, region: &str) -> Result<S3Client> {
        require_region("s3", region)?;
        Ok(S3Client::from_context(self, region))
    }

    fn ssm(&self, region: &str) -> Result<SsmClient> {
        require_region("ssm", region)?;
        Ok(SsmClient::from_context(self, region))
    }

    fn tagging(&self, region: &str) -> Result<TaggingClient> {
        require_region("tagging", region)?;
        Ok(TaggingClient::from_context(self, region))
    }
}
