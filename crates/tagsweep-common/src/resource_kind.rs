//! AWS resource kinds handled by tagsweep
//!
//! Every ARN resolves to exactly one kind. Kinds the registry has no entry
//! for resolve to [`ResourceKind::Unsupported`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Types of AWS resources tagsweep knows how to tear down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// EC2 instance (security groups and data volumes are detached first)
    Ec2Instance,
    /// EC2 security group (detached from every instance first)
    Ec2SecurityGroup,
    /// EBS volume
    Ec2Volume,
    IamUser,
    IamRole,
    IamPolicy,
    ApiGatewayRestApi,
    ApiGatewayUsagePlan,
    ApiGatewayStage,
    ApiGatewayApiKey,
    /// KMS key (disabled, then scheduled for deletion)
    KmsKey,
    LambdaFunction,
    S3Bucket,
    SsmParameter,
    /// Fallback for ARNs with no registered handler
    Unsupported,
}

impl ResourceKind {
    /// Every supported kind, in registry order. Excludes `Unsupported`.
    pub const SUPPORTED: [ResourceKind; 14] = [
        ResourceKind::Ec2Instance,
        ResourceKind::Ec2SecurityGroup,
        ResourceKind::Ec2Volume,
        ResourceKind::IamUser,
        ResourceKind::IamRole,
        ResourceKind::IamPolicy,
        ResourceKind::ApiGatewayRestApi,
        ResourceKind::ApiGatewayUsagePlan,
        ResourceKind::ApiGatewayStage,
        ResourceKind::ApiGatewayApiKey,
        ResourceKind::KmsKey,
        ResourceKind::LambdaFunction,
        ResourceKind::S3Bucket,
        ResourceKind::SsmParameter,
    ];

    /// Service namespace as it appears in field 2 of an ARN
    pub fn service(self) -> &'static str {
        match self {
            ResourceKind::Ec2Instance | ResourceKind::Ec2SecurityGroup | ResourceKind::Ec2Volume => {
                "ec2"
            }
            ResourceKind::IamUser | ResourceKind::IamRole | ResourceKind::IamPolicy => "iam",
            ResourceKind::ApiGatewayRestApi
            | ResourceKind::ApiGatewayUsagePlan
            | ResourceKind::ApiGatewayStage
            | ResourceKind::ApiGatewayApiKey => "apigateway",
            ResourceKind::KmsKey => "kms",
            ResourceKind::LambdaFunction => "lambda",
            ResourceKind::S3Bucket => "s3",
            ResourceKind::SsmParameter => "ssm",
            ResourceKind::Unsupported => "unsupported",
        }
    }

    /// Resource type as derived from an ARN by the router
    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::Ec2Instance => "instance",
            ResourceKind::Ec2SecurityGroup => "security-group",
            ResourceKind::Ec2Volume => "volume",
            ResourceKind::IamUser => "user",
            ResourceKind::IamRole => "role",
            ResourceKind::IamPolicy => "policy",
            ResourceKind::ApiGatewayRestApi => "restapis",
            ResourceKind::ApiGatewayUsagePlan => "usageplans",
            ResourceKind::ApiGatewayStage => "stages",
            ResourceKind::ApiGatewayApiKey => "apikeys",
            ResourceKind::KmsKey => "key",
            ResourceKind::LambdaFunction => "function",
            ResourceKind::S3Bucket => "bucket",
            ResourceKind::SsmParameter => "parameter",
            ResourceKind::Unsupported => "unsupported",
        }
    }

    /// Resource type name used in report messages
    pub fn report_name(self) -> &'static str {
        match self {
            ResourceKind::ApiGatewayRestApi => "rest-api",
            ResourceKind::ApiGatewayUsagePlan => "usage-plan",
            ResourceKind::ApiGatewayStage => "api-stage",
            ResourceKind::ApiGatewayApiKey => "api-key",
            other => other.resource_type(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service(), self.resource_type())
    }
}
