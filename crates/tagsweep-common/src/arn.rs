//! ARN parsing and (service, resource-type) extraction
//!
//! ARNs have the general form
//! `arn:<partition>:<service>:<region>:<account>:<resource>` where the
//! resource part is usually `<resource-type>/<resource-id>`. A few services
//! deviate from that shape and are special-cased in [`ResourceKey::from_arn`]:
//!
//! | Service | Example | Resource type |
//! |---------|---------|---------------|
//! | `apigateway` | `arn:aws:apigateway:us-east-1::/restapis/a1b2/stages/prod` | `stages` |
//! | `apigateway` | `arn:aws:apigateway:us-east-1::/usageplans/x9` | `usageplans` |
//! | `s3` | `arn:aws:s3:::my-bucket` | `bucket` |
//! | `lambda` | `arn:aws:lambda:us-east-1:123456789012:function:fn` | `function` |

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum number of colon-delimited fields in a well-formed ARN
const MIN_FIELDS: usize = 6;

/// Errors produced while parsing an ARN string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArnError {
    #[error("ARN must start with 'arn:': {0}")]
    MissingPrefix(String),

    #[error("ARN has {found} colon-delimited fields, expected at least {MIN_FIELDS}: {arn}")]
    TooFewFields { arn: String, found: usize },
}

/// A parsed Amazon Resource Name.
///
/// The original string is kept verbatim; accessors slice it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    raw: String,
}

impl Arn {
    /// Parse an ARN, validating only its outer shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, ArnError> {
        let raw = s.into();
        if !raw.starts_with("arn:") {
            return Err(ArnError::MissingPrefix(raw));
        }
        let found = raw.split(':').count();
        if found < MIN_FIELDS {
            return Err(ArnError::TooFewFields { arn: raw, found });
        }
        Ok(Self { raw })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All colon-delimited fields, including any colons inside the resource part.
    pub fn fields(&self) -> Vec<&str> {
        self.raw.split(':').collect()
    }

    fn field(&self, index: usize) -> &str {
        self.raw.split(':').nth(index).unwrap_or_default()
    }

    pub fn partition(&self) -> &str {
        self.field(1)
    }

    pub fn service(&self) -> &str {
        self.field(2)
    }

    /// Region field; empty for global services such as IAM and S3.
    pub fn region(&self) -> &str {
        self.field(3)
    }

    pub fn account(&self) -> &str {
        self.field(4)
    }

    /// Everything after the account field, colons included.
    pub fn resource(&self) -> &str {
        self.raw.splitn(MIN_FIELDS, ':').nth(5).unwrap_or_default()
    }

    /// The last colon-delimited field.
    pub fn last_field(&self) -> &str {
        self.raw.rsplit(':').next().unwrap_or_default()
    }

    /// `/`-delimited segments of the last colon field.
    pub fn path_segments(&self) -> Vec<&str> {
        self.last_field().split('/').collect()
    }

    /// Segment after the final `/` of the whole ARN.
    ///
    /// This is the local identifier for most resource types
    /// (`instance/i-0abc` → `i-0abc`, `role/path/name` → `name`).
    pub fn resource_id(&self) -> &str {
        self.raw.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arn::parse(s)
    }
}

impl AsRef<str> for Arn {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

/// Lookup key into the service registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub service: String,
    pub resource_type: String,
}

impl ResourceKey {
    pub fn new(service: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Derive the (service, resource-type) pair for an ARN.
    pub fn from_arn(arn: &Arn) -> Self {
        let service = arn.service();
        let resource_type = match service {
            "apigateway" => api_gateway_resource_type(arn),
            // Object-level ARNs are not supported; every S3 ARN is treated as a bucket
            "s3" => "bucket",
            "lambda" => {
                let fields = arn.fields();
                fields
                    .len()
                    .checked_sub(2)
                    .and_then(|i| fields.get(i).copied())
                    .unwrap_or_default()
            }
            _ => arn.last_field().split('/').next().unwrap_or_default(),
        };
        Self::new(service, resource_type)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.resource_type)
    }
}

/// API Gateway ARNs carry a path: `/restapis/<id>`, `/usageplans/<id>`,
/// `/apikeys/<id>` or `/restapis/<id>/stages/<name>`.
fn api_gateway_resource_type(arn: &Arn) -> &str {
    let segments = arn.path_segments();
    if segments.len() > 3 && segments[3] == "stages" {
        return "stages";
    }
    segments.get(1).copied().unwrap_or_default()
}
